use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The packet at `offset` does not start with the 0x47 sync byte.
    #[error("malformed stream: bad sync byte 0x{byte:02x} at offset {offset}")]
    MalformedStream { byte: u8, offset: u64 },

    #[error("truncated stream: source ended before a PMT was found")]
    TruncatedStream,

    #[error("playlist error: {0}")]
    Playlist(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, DemuxError>;
