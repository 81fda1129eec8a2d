use super::parser::{parse_adaptation_field, parse_header, payload_offset};
use super::pes::PESHandler;
use super::reader::PacketReader;
use super::section::{select_program, select_streams, PATHandler, PMTHandler};
use super::types::*;
use crate::av::{Sample, SamplePool, StreamCategory};
use crate::error::{DemuxError, Result};
use log::{debug, info, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::io::Read;

/// Stream imperfections the demuxer tolerated.
///
/// None of these stop demuxing; they are counted so callers can tell a clean
/// segment from a damaged one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    /// Transport packets read from the source.
    pub packets: u64,
    /// Packets on PIDs nobody listens to.
    pub dropped_packets: u64,
    pub continuity_errors: u64,
    pub table_id_mismatches: u64,
    /// Units whose reassembled length disagreed with their PES_packet_length.
    pub length_mismatches: u64,
    pub bad_start_codes: u64,
    pub truncated_headers: u64,
}

/// Lifecycle of a [`TSDemuxer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerState {
    /// Reading packets until the PMT has been parsed; only seen during construction.
    AwaitingPmt,
    Demuxing,
    /// The source is exhausted; samples still in progress are being handed out.
    Draining,
    Finished,
}

/// The capability registered for a PID in the dispatch table.
#[derive(Debug)]
enum PayloadHandler {
    Pat(PATHandler),
    Pmt(PMTHandler),
    Pes(PESHandler),
}

#[derive(Debug)]
struct PidEntry {
    handler: PayloadHandler,
    continuity_counter: Option<u8>,
}

impl PidEntry {
    fn new(handler: PayloadHandler) -> Self {
        Self {
            handler,
            continuity_counter: None,
        }
    }
}

/// What a handler produced for the packet it was given.
enum HandlerOutput {
    Programs(Vec<ProgramEntry>),
    Streams(Vec<StreamEntry>),
    Sample(Sample),
}

/// PID dispatch and the state the handlers share.
#[derive(Debug)]
struct Dispatcher {
    handlers: HashMap<u16, PidEntry>,
    /// PES PIDs in the order they were installed; drives end-of-stream flushing.
    pes_pids: Vec<u16>,
    audio_stream_type: Option<StreamType>,
    video_stream_type: Option<StreamType>,
    has_pmt: bool,
    ready: VecDeque<Sample>,
    pool: SamplePool,
    stats: DemuxStats,
}

impl Dispatcher {
    fn new(pool: SamplePool) -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(PID_PAT, PidEntry::new(PayloadHandler::Pat(PATHandler::new())));
        Self {
            handlers,
            pes_pids: Vec::new(),
            audio_stream_type: None,
            video_stream_type: None,
            has_pmt: false,
            ready: VecDeque::new(),
            pool,
            stats: DemuxStats::default(),
        }
    }

    fn dispatch(&mut self, offset: u64, packet: &[u8]) -> Result<()> {
        let header = parse_header(packet, offset)?;
        self.stats.packets += 1;

        let Some(entry) = self.handlers.get_mut(&header.pid) else {
            self.stats.dropped_packets += 1;
            return Ok(());
        };
        if !header.contains_payload {
            return Ok(());
        }

        let adaptation = parse_adaptation_field(packet, &header);
        let discontinuity = adaptation.map_or(false, |field| field.discontinuity);
        if let Some(last) = entry.continuity_counter {
            let expected = (last + 1) & 0x0F;
            if expected != header.continuity_counter && !discontinuity {
                trace!(
                    "cc error on PID {}: {} -> {}",
                    header.pid,
                    last,
                    header.continuity_counter
                );
                self.stats.continuity_errors += 1;
            }
        }
        entry.continuity_counter = Some(header.continuity_counter);

        let payload = &packet[payload_offset(packet, adaptation.as_ref())..];
        let unit_start = header.payload_unit_start;
        let output = match &mut entry.handler {
            PayloadHandler::Pat(handler) => handler
                .handle_payload(payload, &mut self.stats)
                .map(HandlerOutput::Programs),
            PayloadHandler::Pmt(handler) => handler
                .handle_payload(payload, &mut self.stats)
                .map(HandlerOutput::Streams),
            PayloadHandler::Pes(handler) => handler
                .handle_payload(
                    payload,
                    unit_start,
                    adaptation.map_or(false, |field| field.random_access),
                    &self.pool,
                    &mut self.stats,
                )
                .map(HandlerOutput::Sample),
        };

        match output {
            Some(HandlerOutput::Programs(programs)) => self.install_pmt(header.pid, &programs),
            Some(HandlerOutput::Streams(streams)) => self.install_streams(header.pid, &streams),
            Some(HandlerOutput::Sample(sample)) => self.ready.push_back(sample),
            None => {}
        }
        Ok(())
    }

    fn install_pmt(&mut self, pat_pid: u16, programs: &[ProgramEntry]) {
        // do not listen to PAT updates
        self.handlers.remove(&pat_pid);

        match select_program(programs) {
            Some(program) => {
                info!(
                    "program {} has its PMT on PID {}",
                    program.program_number, program.program_map_pid
                );
                self.handlers.insert(
                    program.program_map_pid,
                    PidEntry::new(PayloadHandler::Pmt(PMTHandler::new())),
                );
            }
            None => warn!("PAT lists no programs"),
        }
    }

    fn install_streams(&mut self, pmt_pid: u16, streams: &[StreamEntry]) {
        // do not listen to PMT updates
        self.handlers.remove(&pmt_pid);

        for (pid, stream_type) in select_streams(streams) {
            info!("{} stream {} on PID {}", stream_type.category(), stream_type, pid);
            match stream_type.category() {
                StreamCategory::Audio => {
                    if !stream_type.signals_unit_start() {
                        warn!(
                            "audio stream is {}, unit starts will be found by scanning for start codes",
                            stream_type
                        );
                    }
                    self.audio_stream_type = Some(stream_type);
                }
                StreamCategory::Video => self.video_stream_type = Some(stream_type),
            }
            self.handlers.insert(
                pid,
                PidEntry::new(PayloadHandler::Pes(PESHandler::new(pid, stream_type))),
            );
            self.pes_pids.push(pid);
        }
        self.has_pmt = true;
    }

    /// Takes the next in-progress sample, in handler installation order.
    fn flush_next(&mut self) -> Option<Sample> {
        for pid in &self.pes_pids {
            if let Some(PidEntry {
                handler: PayloadHandler::Pes(handler),
                ..
            }) = self.handlers.get_mut(pid)
            {
                if let Some(sample) = handler.flush() {
                    return Some(sample);
                }
            }
        }
        None
    }
}

/// MPEG Transport Stream demuxer.
///
/// Pulls 188-byte packets from a blocking byte source, follows the PAT to the
/// first program's PMT, and reassembles the first audio stream (AAC or MPEG
/// audio) and the first H.264 stream into [`Sample`]s.
///
/// Construction blocks until the PMT has been read. Afterwards each
/// [`read_sample`](Self::read_sample) call reads packets until a unit
/// completes; once the source is exhausted the units still in progress are
/// returned one per call, then `None` forever.
///
/// ```no_run
/// use std::fs::File;
/// use tsdemux::av::SamplePool;
/// use tsdemux::format::ts::TSDemuxer;
///
/// # fn main() -> tsdemux::Result<()> {
/// let pool = SamplePool::default();
/// let mut demuxer = TSDemuxer::new(File::open("segment.ts")?, pool.clone())?;
/// while let Some(sample) = demuxer.read_sample()? {
///     println!("{} pts={} {} bytes", sample.category(), sample.pts(), sample.len());
///     pool.release(sample);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TSDemuxer<R> {
    reader: PacketReader<R>,
    dispatcher: Dispatcher,
    state: DemuxerState,
}

impl<R: Read> TSDemuxer<R> {
    /// Creates a demuxer and reads from `source` until the PMT has been parsed.
    ///
    /// Fails with [`DemuxError::TruncatedStream`] when the source ends first,
    /// or with [`DemuxError::MalformedStream`] on a lost sync byte.
    pub fn new(source: R, pool: SamplePool) -> Result<Self> {
        let mut demuxer = Self {
            reader: PacketReader::new(source),
            dispatcher: Dispatcher::new(pool),
            state: DemuxerState::AwaitingPmt,
        };

        while !demuxer.dispatcher.has_pmt {
            match demuxer.reader.next_packet()? {
                Some((offset, packet)) => demuxer.dispatcher.dispatch(offset, packet)?,
                None => return Err(DemuxError::TruncatedStream),
            }
        }
        demuxer.state = DemuxerState::Demuxing;
        Ok(demuxer)
    }

    /// Returns the next complete sample, or `None` once every sample has been returned.
    ///
    /// After an error the demuxer is finished and only returns `None`.
    pub fn read_sample(&mut self) -> Result<Option<Sample>> {
        loop {
            match self.state {
                DemuxerState::AwaitingPmt | DemuxerState::Demuxing => {
                    if let Some(sample) = self.dispatcher.ready.pop_front() {
                        return Ok(Some(sample));
                    }
                    if let Err(e) = self.read_one_packet() {
                        self.state = DemuxerState::Finished;
                        return Err(e);
                    }
                }
                DemuxerState::Draining => {
                    if let Some(sample) = self.dispatcher.ready.pop_front() {
                        return Ok(Some(sample));
                    }
                    if let Some(sample) = self.dispatcher.flush_next() {
                        return Ok(Some(sample));
                    }
                    self.state = DemuxerState::Finished;
                }
                DemuxerState::Finished => return Ok(None),
            }
        }
    }

    fn read_one_packet(&mut self) -> Result<()> {
        match self.reader.next_packet()? {
            Some((offset, packet)) => self.dispatcher.dispatch(offset, packet),
            None => {
                debug!(
                    "end of stream after {} packets",
                    self.dispatcher.stats.packets
                );
                self.state = DemuxerState::Draining;
                Ok(())
            }
        }
    }

    /// The stream type selected for `category`, if the PMT listed one.
    pub fn stream_type(&self, category: StreamCategory) -> Option<StreamType> {
        match category {
            StreamCategory::Audio => self.dispatcher.audio_stream_type,
            StreamCategory::Video => self.dispatcher.video_stream_type,
        }
    }

    pub fn state(&self) -> DemuxerState {
        self.state
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.dispatcher.stats
    }

    /// PIDs currently routed to a handler.
    pub fn active_pids(&self) -> Vec<u16> {
        let mut pids: Vec<u16> = self.dispatcher.handlers.keys().copied().collect();
        pids.sort_unstable();
        pids
    }
}

impl<R: Read> Iterator for TSDemuxer<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_sample().transpose()
    }
}
