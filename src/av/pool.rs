use super::{Sample, StreamCategory};
use crate::config::PoolConfig;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::Arc;

/// Counters describing how a [`SamplePool`] has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Samples handed out by `allocate`.
    pub allocations: u64,
    /// Allocations served from an idle buffer instead of a fresh one.
    pub reused: u64,
    pub grown: u64,
    pub released: u64,
}

#[derive(Debug)]
struct PoolState {
    config: PoolConfig,
    audio: Vec<BytesMut>,
    video: Vec<BytesMut>,
    stats: PoolStats,
}

impl PoolState {
    fn idle_mut(&mut self, category: StreamCategory) -> &mut Vec<BytesMut> {
        match category {
            StreamCategory::Audio => &mut self.audio,
            StreamCategory::Video => &mut self.video,
        }
    }

    fn initial_size(&self, category: StreamCategory) -> usize {
        match category {
            StreamCategory::Audio => self.config.audio_buffer_size,
            StreamCategory::Video => self.config.video_buffer_size,
        }
    }
}

/// Reusable sample buffers, one pool per stream category.
///
/// Cloning the handle shares the pool: every demuxer constructed with a clone
/// of the same `SamplePool` draws from and returns to the same buffers, so
/// opening one segment after another does not pay for a large allocation
/// each time. The pool lives as long as its last handle.
#[derive(Debug, Clone)]
pub struct SamplePool {
    inner: Arc<Mutex<PoolState>>,
}

impl Default for SamplePool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl SamplePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolState {
                config,
                audio: Vec::new(),
                video: Vec::new(),
                stats: PoolStats::default(),
            })),
        }
    }

    /// Returns an empty sample for `category`, recycling an idle buffer when one is available.
    pub fn allocate(&self, category: StreamCategory) -> Sample {
        let mut state = self.inner.lock();
        let initial = state.initial_size(category);
        state.stats.allocations += 1;

        let buffer = match state.idle_mut(category).pop() {
            Some(mut buffer) => {
                buffer.clear();
                if buffer.capacity() < initial {
                    buffer.reserve(initial);
                }
                state.stats.reused += 1;
                buffer
            }
            None => BytesMut::with_capacity(initial),
        };
        Sample::new(category, buffer)
    }

    /// Doubles the capacity of `sample`'s buffer, keeping its contents.
    pub fn grow(&self, sample: &mut Sample) {
        let buffer = sample.buffer_mut();
        let additional = buffer.capacity().max(1);
        buffer.reserve(buffer.capacity() - buffer.len() + additional);
        self.inner.lock().stats.grown += 1;
    }

    /// Takes back a sample the caller is done with.
    pub fn release(&self, sample: Sample) {
        let category = sample.category();
        let buffer = sample.into_buffer();
        let mut state = self.inner.lock();
        state.stats.released += 1;
        let limit = state.config.max_idle_buffers;
        let idle = state.idle_mut(category);
        if idle.len() < limit {
            idle.push(buffer);
        }
    }

    pub fn idle_buffers(&self, category: StreamCategory) -> usize {
        self.inner.lock().idle_mut(category).len()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small_pool() -> SamplePool {
        SamplePool::new(PoolConfig {
            audio_buffer_size: 256,
            video_buffer_size: 1024,
            max_idle_buffers: 1,
        })
    }

    #[test]
    fn test_allocate_per_category() {
        let pool = small_pool();
        let audio = pool.allocate(StreamCategory::Audio);
        let video = pool.allocate(StreamCategory::Video);

        assert_eq!(audio.category(), StreamCategory::Audio);
        assert!(audio.capacity() >= 256);
        assert!(video.capacity() >= 1024);
        assert!(audio.is_empty() && video.is_empty());
        assert_eq!(pool.stats().allocations, 2);
    }

    #[test]
    fn test_grow_doubles_and_preserves() {
        let pool = small_pool();
        let mut sample = pool.allocate(StreamCategory::Audio);
        sample.push_data(&[7u8; 200]);
        let before = sample.capacity();

        pool.grow(&mut sample);

        assert!(sample.capacity() >= before * 2);
        assert_eq!(sample.data(), &[7u8; 200][..]);
        assert_eq!(pool.stats().grown, 1);
    }

    #[test]
    fn test_release_recycles_buffer() {
        let pool = small_pool();
        let mut sample = pool.allocate(StreamCategory::Video);
        sample.push_data(b"frame");
        pool.grow(&mut sample);
        let grown_capacity = sample.capacity();
        pool.release(sample);
        assert_eq!(pool.idle_buffers(StreamCategory::Video), 1);

        let recycled = pool.allocate(StreamCategory::Video);
        assert!(recycled.is_empty());
        assert!(recycled.capacity() >= grown_capacity);
        assert_eq!(pool.idle_buffers(StreamCategory::Video), 0);
        assert_eq!(pool.stats().reused, 1);
    }

    #[test]
    fn test_release_respects_idle_limit() {
        let pool = small_pool();
        let first = pool.allocate(StreamCategory::Audio);
        let second = pool.allocate(StreamCategory::Audio);
        pool.release(first);
        pool.release(second);

        assert_eq!(pool.idle_buffers(StreamCategory::Audio), 1);
        assert_eq!(pool.stats().released, 2);
    }

    #[test]
    fn test_clones_share_buffers() {
        let pool = small_pool();
        let other = pool.clone();
        pool.release(other.allocate(StreamCategory::Audio));

        assert_eq!(other.idle_buffers(StreamCategory::Audio), 1);
        let _ = pool.allocate(StreamCategory::Audio);
        assert_eq!(other.stats().reused, 1);
    }
}
