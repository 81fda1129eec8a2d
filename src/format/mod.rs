//! Container formats.
//!
//! [`ts`] holds the transport stream demuxer; [`hls`] reads the media
//! playlists that transport stream segments are usually delivered through.

pub mod hls;
pub mod ts;

pub use self::hls::{HLSPlaylist, HLSSegment};
pub use self::ts::{DemuxStats, DemuxerState, TSDemuxer};
