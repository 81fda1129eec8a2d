use std::fmt;

/// Kind of elementary stream a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamCategory {
    Audio,
    Video,
}

impl fmt::Display for StreamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamCategory::Audio => f.write_str("audio"),
            StreamCategory::Video => f.write_str("video"),
        }
    }
}

mod packet;
mod pool;
pub use packet::*;
pub use pool::*;
