use super::StreamCategory;
use bytes::{Bytes, BytesMut};
use std::time::Duration;

/// Clock rate of [`Sample::pts`] values.
pub const PTS_CLOCK_HZ: u64 = 45_000;

/// One elementary-stream access unit extracted from a transport stream.
///
/// While a sample is being reassembled it is owned by its PES handler; once
/// returned from the demuxer it belongs to the caller and is never touched by
/// the demuxer again. Hand it back through
/// [`SamplePool::release`](super::SamplePool::release) to recycle the buffer.
#[derive(Debug)]
pub struct Sample {
    category: StreamCategory,
    pts: u64,
    is_key: bool,
    data: BytesMut,
}

impl Sample {
    pub(crate) fn new(category: StreamCategory, data: BytesMut) -> Self {
        Self {
            category,
            pts: 0,
            is_key: false,
            data,
        }
    }

    pub(crate) fn with_pts(mut self, pts: u64) -> Self {
        self.pts = pts;
        self
    }

    pub(crate) fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn category(&self) -> StreamCategory {
        self.category
    }

    /// Presentation timestamp in [`PTS_CLOCK_HZ`] ticks, 0 when the PES header had none.
    pub fn pts(&self) -> u64 {
        self.pts
    }

    pub fn presentation_time(&self) -> Duration {
        Duration::from_nanos(self.pts * 1_000_000_000 / PTS_CLOCK_HZ)
    }

    /// Whether the unit started in a packet flagged as a random access point.
    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    pub(crate) fn spare_capacity(&self) -> usize {
        self.data.capacity() - self.data.len()
    }

    pub(crate) fn push_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    pub(crate) fn into_buffer(self) -> BytesMut {
        self.data
    }
}
