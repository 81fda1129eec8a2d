//! # MPEG Transport Stream (TS) Demuxing
//!
//! This module turns a raw transport stream, as delivered in HLS segments,
//! into timestamped elementary-stream samples:
//!
//! - Packet synchronization and PID dispatch
//! - Program Association / Program Map Table reassembly
//! - Packetized Elementary Stream (PES) reassembly and PTS extraction
//!
//! Only the first program is followed, and within it the first audio stream
//! (AAC ADTS or MPEG audio) and the first H.264 stream. Table updates after
//! the initial PAT/PMT are ignored.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::io::Cursor;
//! use tsdemux::av::SamplePool;
//! use tsdemux::format::ts::TSDemuxer;
//! use tsdemux::DemuxError;
//!
//! // A stream that ends before any PMT shows up cannot be demuxed.
//! let result = TSDemuxer::new(Cursor::new(Vec::new()), SamplePool::default());
//! assert!(matches!(result, Err(DemuxError::TruncatedStream)));
//! ```

/// PID dispatch and the consumer-facing demuxer
pub mod demuxer;

/// Low-level TS packet parsing utilities
pub mod parser;

/// PES header parsing and elementary stream reassembly
pub mod pes;

/// Packet-aligned reading from a byte source
pub mod reader;

/// PSI section reassembly and PAT/PMT parsing
pub mod section;

/// Core TS types and constants
pub mod types;


// Re-export commonly used types and constants
pub use demuxer::{DemuxStats, DemuxerState, TSDemuxer};
pub use pes::{PESHandler, PESHeader};
pub use reader::PacketReader;
pub use section::{PATHandler, PMTHandler, SectionReassembler};
pub use types::{
    ProgramEntry,
    StreamEntry,
    StreamType,
    TSHeader,
    PID_PAT,
    STREAM_TYPE_AAC,
    STREAM_TYPE_H264,
    STREAM_TYPE_MPEG_AUDIO,
    STREAM_TYPE_MPEG_AUDIO2,
    TS_PACKET_SIZE,
};
