//! HLS media playlists.
//!
//! Transport stream segments usually arrive through an HLS media playlist.
//! [`HLSPlaylist::parse`] turns one into absolute segment URLs with their
//! timing, encryption and byte-range information, so each segment can be
//! fetched and handed to a [`TSDemuxer`](crate::format::ts::TSDemuxer).

use crate::error::{DemuxError, Result};
use log::debug;
use m3u8_rs::{KeyMethod, MediaPlaylist, MediaSegment, Playlist};
use std::time::Duration;
use url::Url;

/// Playlist version assumed when `#EXT-X-VERSION` is absent.
const DEFAULT_VERSION: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionMethod {
    Aes128,
    SampleAes,
    /// A method this crate does not know, as written in the playlist.
    Other(String),
}

/// Encryption in effect for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HLSKey {
    pub method: EncryptionMethod,
    /// Key location, resolved against the playlist URL.
    pub uri: Option<Url>,
    /// The explicit IV, or the segment's media sequence number when the key has none.
    pub iv: [u8; 16],
}

/// A sub-range of the resource behind a segment URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HLSSegment {
    pub uri: Url,
    pub duration: Duration,
    pub title: Option<String>,
    pub sequence_number: u64,
    /// Sum of the durations of the segments before this one.
    pub start_time: Duration,
    /// Set when `#EXT-X-DISCONTINUITY` precedes the segment.
    pub discontinuity: bool,
    pub key: Option<HLSKey>,
    /// `None` when the whole resource is the segment.
    pub byte_range: Option<ByteRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HLSPlaylist {
    pub version: usize,
    pub target_duration: Duration,
    pub media_sequence: u64,
    /// No `#EXT-X-ENDLIST`: the playlist may still grow.
    pub is_live: bool,
    pub segments: Vec<HLSSegment>,
}

impl HLSPlaylist {
    /// Parses a media playlist fetched from `base`.
    ///
    /// Master playlists are rejected with [`DemuxError::Playlist`]; pick a
    /// variant and parse its media playlist instead.
    pub fn parse(base: &Url, data: &[u8]) -> Result<Self> {
        match m3u8_rs::parse_playlist_res(data) {
            Ok(Playlist::MediaPlaylist(playlist)) => Self::from_media_playlist(base, &playlist),
            Ok(Playlist::MasterPlaylist(_)) => Err(DemuxError::Playlist(
                "expected a media playlist, got a master playlist".into(),
            )),
            Err(e) => Err(DemuxError::Playlist(format!(
                "failed to parse media playlist: {e}"
            ))),
        }
    }

    fn from_media_playlist(base: &Url, playlist: &MediaPlaylist) -> Result<Self> {
        let mut segments = Vec::with_capacity(playlist.segments.len());
        let mut start_time = Duration::ZERO;
        let mut key: Option<&m3u8_rs::Key> = None;
        let mut range_end = 0u64;

        for (index, segment) in playlist.segments.iter().enumerate() {
            let sequence_number = playlist.media_sequence + index as u64;
            if segment.key.is_some() {
                key = segment.key.as_ref();
            } else if ends_encryption(segment) {
                key = None;
            }

            let duration = Duration::try_from_secs_f64(segment.duration as f64).map_err(|e| {
                DemuxError::Playlist(format!(
                    "bad duration {} for segment {}: {e}",
                    segment.duration, sequence_number
                ))
            })?;

            let byte_range = segment.byte_range.as_ref().map(|range| {
                let range = ByteRange {
                    offset: range.offset.unwrap_or(range_end),
                    length: range.length,
                };
                range_end = range.end();
                range
            });

            segments.push(HLSSegment {
                uri: base.join(&segment.uri)?,
                duration,
                title: segment.title.clone().filter(|title| !title.is_empty()),
                sequence_number,
                start_time,
                discontinuity: segment.discontinuity,
                key: key.map(|key| resolve_key(base, key, sequence_number)).transpose()?.flatten(),
                byte_range,
            });
            start_time += duration;
        }

        debug!(
            "parsed media playlist with {} segments from sequence {} ({:?})",
            segments.len(),
            playlist.media_sequence,
            start_time
        );

        Ok(Self {
            version: playlist.version.unwrap_or(DEFAULT_VERSION),
            target_duration: Duration::from_secs(playlist.target_duration),
            media_sequence: playlist.media_sequence,
            is_live: !playlist.end_list,
            segments,
        })
    }

    /// Total duration of the listed segments.
    pub fn duration(&self) -> Duration {
        self.segments.iter().map(|segment| segment.duration).sum()
    }

    pub fn is_encrypted(&self) -> bool {
        self.segments.iter().any(|segment| segment.key.is_some())
    }
}

/// m3u8-rs rejects an `#EXT-X-KEY:METHOD=NONE` without an IV and keeps it as
/// an unknown tag, so the key in effect has to be cleared from there.
fn ends_encryption(segment: &MediaSegment) -> bool {
    segment.unknown_tags.iter().any(|tag| {
        tag.tag == "X-KEY"
            && tag.rest.as_deref().map_or(false, |attributes| {
                attributes
                    .split(',')
                    .any(|attribute| attribute.trim().eq_ignore_ascii_case("METHOD=NONE"))
            })
    })
}

/// `None` for `METHOD=NONE`, which ends encryption.
fn resolve_key(base: &Url, key: &m3u8_rs::Key, sequence_number: u64) -> Result<Option<HLSKey>> {
    let method = match &key.method {
        KeyMethod::None => return Ok(None),
        KeyMethod::AES128 => EncryptionMethod::Aes128,
        KeyMethod::SampleAES => EncryptionMethod::SampleAes,
        KeyMethod::Other(method) => EncryptionMethod::Other(method.clone()),
    };
    let uri = key.uri.as_deref().map(|uri| base.join(uri)).transpose()?;
    let iv = match key.iv.as_deref() {
        Some(iv) => parse_iv(iv)?,
        None => (sequence_number as u128).to_be_bytes(),
    };
    Ok(Some(HLSKey { method, uri, iv }))
}

fn parse_iv(iv: &str) -> Result<[u8; 16]> {
    let digits = iv
        .strip_prefix("0x")
        .or_else(|| iv.strip_prefix("0X"))
        .unwrap_or(iv);
    Ok(u128::from_str_radix(digits, 16)?.to_be_bytes())
}
