use super::demuxer::DemuxStats;
use super::parser::decode_pts;
use super::types::*;
use crate::av::{Sample, SamplePool, StreamCategory};
use log::{debug, warn};

/// Packetized Elementary Stream (PES) header as found at the start of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PESHeader {
    /// Start code prefix, 0x000001 for well-formed packets
    pub start_code_prefix: [u8; 3],
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Length of the PES packet after this field, 0 when unbounded
    pub packet_length: u16,
    /// Flags indicating presence of PTS/DTS fields
    pub pts_dts_flags: u8,
    /// Length of the optional header fields that follow
    pub header_data_length: u8,
    /// Presentation Time Stamp in 45 kHz ticks
    pub pts: Option<u64>,
}

impl PESHeader {
    /// Parses the header at the start of `data`.
    ///
    /// Returns the header and the offset of the first payload byte, or `None`
    /// when `data` is too short to hold the fixed part of the header.
    pub fn parse(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < PES_FIXED_HEADER_SIZE {
            return None;
        }

        let pts_dts_flags = data[7];
        let header_data_length = data[8];
        let pts = if (pts_dts_flags & 0x80) != 0 {
            data.get(PES_FIXED_HEADER_SIZE..PES_FIXED_HEADER_SIZE + PES_TIMESTAMP_SIZE)
                .and_then(|bytes| bytes.try_into().ok())
                .map(decode_pts)
        } else {
            None
        };
        // A DTS (flag 0x40) may follow the PTS; it is covered by header_data_length.

        let header = PESHeader {
            start_code_prefix: [data[0], data[1], data[2]],
            stream_id: data[3],
            packet_length: ((data[4] as u16) << 8) | data[5] as u16,
            pts_dts_flags,
            header_data_length,
            pts,
        };
        let payload_offset = (PES_FIXED_HEADER_SIZE + header_data_length as usize).min(data.len());
        Some((header, payload_offset))
    }

    pub fn has_valid_start_code(&self) -> bool {
        self.start_code_prefix == PES_START_CODE_PREFIX
    }

    /// Payload bytes announced by the header, `None` when the length is unbounded.
    ///
    /// Negative when the declared packet length does not even cover the header.
    pub fn payload_length(&self) -> Option<i64> {
        if self.packet_length == 0 {
            return None;
        }
        Some(self.packet_length as i64 - (self.header_data_length as i64 + 3))
    }
}

/// Reassembles the access units of one elementary stream.
#[derive(Debug)]
pub struct PESHandler {
    pid: u16,
    category: StreamCategory,
    /// Find unit starts by scanning for the start code instead of trusting the packet flag.
    scan_unit_start: bool,
    current: Option<Sample>,
    /// Payload length announced by the current unit's header, `None` when unbounded.
    length: Option<i64>,
}

impl PESHandler {
    pub fn new(pid: u16, stream_type: StreamType) -> Self {
        Self {
            pid,
            category: stream_type.category(),
            scan_unit_start: !stream_type.signals_unit_start(),
            current: None,
            length: None,
        }
    }

    pub fn scans_unit_start(&self) -> bool {
        self.scan_unit_start
    }

    pub fn has_pending_sample(&self) -> bool {
        self.current.is_some()
    }

    /// Feeds one packet payload.
    ///
    /// Returns the previous sample when this payload starts a new unit.
    pub fn handle_payload(
        &mut self,
        payload: &[u8],
        unit_start: bool,
        random_access: bool,
        pool: &SamplePool,
        stats: &mut DemuxStats,
    ) -> Option<Sample> {
        let unit_start = if self.scan_unit_start {
            self.detect_unit_start(payload)
        } else {
            unit_start
        };

        if unit_start {
            let finished = self.current.take().map(|sample| {
                if let Some(expected) = self.length_mismatch(&sample) {
                    debug!("PES length {} != {} on PID {}", sample.len(), expected, self.pid);
                    stats.length_mismatches += 1;
                }
                sample
            });
            self.start_unit(payload, random_access, pool, stats);
            return finished;
        }

        // Without a sample in progress we are still waiting for the first unit start.
        if let Some(sample) = self.current.as_mut() {
            append(pool, sample, payload);
        }
        None
    }

    /// Hands out the unit in progress, if any.
    pub fn flush(&mut self) -> Option<Sample> {
        self.current.take()
    }

    fn detect_unit_start(&self, payload: &[u8]) -> bool {
        if !payload.starts_with(&PES_START_CODE_PREFIX) {
            return false;
        }
        let Some(sample) = &self.current else {
            return true;
        };
        match self.length_mismatch(sample) {
            Some(expected) => {
                debug!(
                    "PES length {} != {} on PID {}, ignoring start code",
                    sample.len(),
                    expected,
                    self.pid
                );
                false
            }
            None => true,
        }
    }

    /// The announced length when `sample` does not match it.
    fn length_mismatch(&self, sample: &Sample) -> Option<i64> {
        self.length.filter(|&expected| expected != sample.len() as i64)
    }

    fn start_unit(
        &mut self,
        payload: &[u8],
        random_access: bool,
        pool: &SamplePool,
        stats: &mut DemuxStats,
    ) {
        let mut sample = pool.allocate(self.category).with_key_flag(random_access);

        let body: &[u8] = match PESHeader::parse(payload) {
            Some((header, offset)) => {
                if !header.has_valid_start_code() {
                    let [a, b, c] = header.start_code_prefix;
                    debug!("bad start code: 0x{:02x}{:02x}{:02x}", a, b, c);
                    stats.bad_start_codes += 1;
                }
                sample = sample.with_pts(header.pts.unwrap_or(0));
                self.length = header.payload_length();
                &payload[offset..]
            }
            None => {
                warn!(
                    "PES header truncated on PID {} ({} bytes)",
                    self.pid,
                    payload.len()
                );
                stats.truncated_headers += 1;
                self.length = None;
                &[]
            }
        };

        append(pool, &mut sample, body);
        self.current = Some(sample);
    }
}

fn append(pool: &SamplePool, sample: &mut Sample, data: &[u8]) {
    if sample.spare_capacity() < TS_PACKET_SIZE {
        pool.grow(sample);
    }
    sample.push_data(data);
}
