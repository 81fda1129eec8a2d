use super::types::{PACKETS_PER_READ, TS_PACKET_SIZE};
use crate::error::Result;
use log::debug;
use std::io::{ErrorKind, Read};

/// Pulls bytes from a source into a packet-aligned buffer.
///
/// A read that stops short of a packet boundary is kept and completed by the
/// next read, so packets are always handed out whole. At the end of the
/// source a truncated trailing packet is zero-padded to full size.
pub struct PacketReader<R> {
    source: R,
    buffer: Box<[u8]>,
    /// Bytes of `buffer` holding data.
    filled: usize,
    /// Start of the next packet to hand out.
    position: usize,
    /// Stream offset of `buffer[0]`.
    base_offset: u64,
    finished: bool,
}

impl<R: Read> PacketReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_packet_capacity(source, PACKETS_PER_READ)
    }

    pub fn with_packet_capacity(source: R, packets: usize) -> Self {
        Self {
            source,
            buffer: vec![0u8; packets.max(1) * TS_PACKET_SIZE].into_boxed_slice(),
            filled: 0,
            position: 0,
            base_offset: 0,
            finished: false,
        }
    }

    /// Returns the next packet and its stream offset, or `None` once the source is exhausted.
    pub fn next_packet(&mut self) -> Result<Option<(u64, &[u8])>> {
        loop {
            if self.position + TS_PACKET_SIZE <= self.filled {
                let start = self.position;
                self.position += TS_PACKET_SIZE;
                return Ok(Some((
                    self.base_offset + start as u64,
                    &self.buffer[start..start + TS_PACKET_SIZE],
                )));
            }
            if self.finished {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    /// Whether the source has reported end of data.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn fill(&mut self) -> Result<()> {
        // Move the unfinished packet, if any, to the front of the buffer.
        if self.position > 0 {
            let pending = self.filled - self.position;
            self.buffer.copy_within(self.position..self.filled, 0);
            self.base_offset += self.position as u64;
            self.filled = pending;
            self.position = 0;
        }

        let read = loop {
            match self.source.read(&mut self.buffer[self.filled..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if read > 0 {
            self.filled += read;
            return Ok(());
        }

        let partial = self.filled % TS_PACKET_SIZE;
        if partial != 0 {
            debug!(
                "TS stream is not a multiple of {} bytes ({} trailing bytes), padding last packet",
                TS_PACKET_SIZE, partial
            );
            let padded = self.filled - partial + TS_PACKET_SIZE;
            self.buffer[self.filled..padded].fill(0);
            self.filled = padded;
        }
        self.finished = true;
        Ok(())
    }
}
