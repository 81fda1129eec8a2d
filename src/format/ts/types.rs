use crate::av::StreamCategory;
use std::fmt;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_MAX: u16 = 0x1fff;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
pub const STREAM_TYPE_MPEG_AUDIO: u8 = 0x03;
pub const STREAM_TYPE_MPEG_AUDIO2: u8 = 0x04;
pub const STREAM_TYPE_AAC: u8 = 0x0f;
pub const STREAM_TYPE_H264: u8 = 0x1b;

// Constants
pub const SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
/// Packets pulled from the source per read.
pub const PACKETS_PER_READ: usize = 200;
pub const INITIAL_SECTION_CAPACITY: usize = 1024;
pub const SECTION_CRC_SIZE: usize = 4;
pub const PES_START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];
/// Start code, stream id, packet length, two flag bytes and the header data length.
pub const PES_FIXED_HEADER_SIZE: usize = 9;
pub const PES_TIMESTAMP_SIZE: usize = 5;

/// Elementary stream types the demuxer knows how to route.
///
/// Codes follow the ISO/IEC 13818-1 stream_type registry; every other code
/// found in a PMT is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// ISO/IEC 11172-3 audio
    MpegAudio,
    /// ISO/IEC 13818-3 audio
    MpegAudio2,
    /// ISO/IEC 13818-7 audio with ADTS transport syntax
    AacAdts,
    /// ITU-T H.264 / ISO/IEC 14496-10 video
    H264,
}

impl StreamType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            STREAM_TYPE_MPEG_AUDIO => Some(StreamType::MpegAudio),
            STREAM_TYPE_MPEG_AUDIO2 => Some(StreamType::MpegAudio2),
            STREAM_TYPE_AAC => Some(StreamType::AacAdts),
            STREAM_TYPE_H264 => Some(StreamType::H264),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            StreamType::MpegAudio => STREAM_TYPE_MPEG_AUDIO,
            StreamType::MpegAudio2 => STREAM_TYPE_MPEG_AUDIO2,
            StreamType::AacAdts => STREAM_TYPE_AAC,
            StreamType::H264 => STREAM_TYPE_H264,
        }
    }

    pub fn category(self) -> StreamCategory {
        match self {
            StreamType::H264 => StreamCategory::Video,
            _ => StreamCategory::Audio,
        }
    }

    /// MPEG audio does not reliably set payload_unit_start_indicator, so
    /// its unit boundaries are found by scanning for the PES start code.
    pub fn signals_unit_start(self) -> bool {
        !matches!(self, StreamType::MpegAudio | StreamType::MpegAudio2)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamType::MpegAudio => "MPEG-1 audio",
            StreamType::MpegAudio2 => "MPEG-2 audio",
            StreamType::AacAdts => "AAC (ADTS)",
            StreamType::H264 => "H.264",
        };
        write!(f, "{} (0x{:02x})", name, self.code())
    }
}

/// One program listed in the PAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramEntry {
    pub program_number: u16,
    pub program_map_pid: u16,
}

/// One elementary stream listed in a PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntry {
    pub stream_type: u8,
    pub elementary_pid: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptationField {
    /// Value of the adaptation_field_length byte.
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TSHeader {
    pub payload_unit_start: bool,
    pub pid: u16,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}
