use crate::error::{DemuxError, Result};
use std::env;
use std::fs;
use std::path::Path;

/// Initial capacity of an audio sample buffer.
pub const DEFAULT_AUDIO_BUFFER_SIZE: usize = 100 * 1024;
/// Initial capacity of a video sample buffer.
pub const DEFAULT_VIDEO_BUFFER_SIZE: usize = 1000 * 1024;
/// Released buffers kept per category for reuse.
pub const DEFAULT_MAX_IDLE_BUFFERS: usize = 4;

const ENV_AUDIO_BUFFER_SIZE: &str = "TSDEMUX_AUDIO_BUFFER_SIZE";
const ENV_VIDEO_BUFFER_SIZE: &str = "TSDEMUX_VIDEO_BUFFER_SIZE";
const ENV_MAX_IDLE_BUFFERS: &str = "TSDEMUX_MAX_IDLE_BUFFERS";

/// Sizing of the sample buffer pool shared by demuxer instances.
///
/// A `PoolConfig` is handed to [`SamplePool::new`](crate::av::SamplePool::new)
/// once per process or player instance; every demuxer built against that pool
/// then recycles the same buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub audio_buffer_size: usize,
    pub video_buffer_size: usize,
    pub max_idle_buffers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            audio_buffer_size: DEFAULT_AUDIO_BUFFER_SIZE,
            video_buffer_size: DEFAULT_VIDEO_BUFFER_SIZE,
            max_idle_buffers: DEFAULT_MAX_IDLE_BUFFERS,
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `TSDEMUX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for key in [
            ENV_AUDIO_BUFFER_SIZE,
            ENV_VIDEO_BUFFER_SIZE,
            ENV_MAX_IDLE_BUFFERS,
        ] {
            if let Some(value) = lookup(key) {
                config.apply(key, &value)?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads `key = value` lines from a config file.
    ///
    /// Keys are the lowercase field names (`audio_buffer_size`, ...).
    /// Blank lines and `#` comments are skipped, values may be quoted.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str_lines(&content)
    }

    fn from_str_lines(content: &str) -> Result<Self> {
        let mut config = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(DemuxError::InvalidData(format!(
                    "expected `key = value`, got `{}`",
                    line
                )));
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            config.apply(key.trim(), value)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed: usize = value.trim().parse()?;
        match key {
            "audio_buffer_size" | ENV_AUDIO_BUFFER_SIZE => self.audio_buffer_size = parsed,
            "video_buffer_size" | ENV_VIDEO_BUFFER_SIZE => self.video_buffer_size = parsed,
            "max_idle_buffers" | ENV_MAX_IDLE_BUFFERS => self.max_idle_buffers = parsed,
            _ => {
                return Err(DemuxError::InvalidData(format!(
                    "unknown config key `{}`",
                    key
                )))
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.audio_buffer_size == 0 || self.video_buffer_size == 0 {
            return Err(DemuxError::InvalidData(
                "sample buffer sizes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.audio_buffer_size, 100 * 1024);
        assert_eq!(config.video_buffer_size, 1000 * 1024);
        assert!(config.audio_buffer_size < config.video_buffer_size);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = PoolConfig::from_lookup(|key| match key {
            "TSDEMUX_AUDIO_BUFFER_SIZE" => Some("4096".to_string()),
            "TSDEMUX_MAX_IDLE_BUFFERS" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(
            config,
            PoolConfig {
                audio_buffer_size: 4096,
                video_buffer_size: DEFAULT_VIDEO_BUFFER_SIZE,
                max_idle_buffers: 0,
            }
        );
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let result = PoolConfig::from_lookup(|key| {
            (key == "TSDEMUX_VIDEO_BUFFER_SIZE").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(DemuxError::ParseInt(_))));

        let result = PoolConfig::from_lookup(|key| {
            (key == "TSDEMUX_VIDEO_BUFFER_SIZE").then(|| "0".to_string())
        });
        assert!(matches!(result, Err(DemuxError::InvalidData(_))));
    }

    #[test]
    fn test_config_file_lines() {
        let config = PoolConfig::from_str_lines(
            "# pool sizing\n\naudio_buffer_size = \"2048\"\nvideo_buffer_size = 65536\n",
        )
        .unwrap();
        assert_eq!(config.audio_buffer_size, 2048);
        assert_eq!(config.video_buffer_size, 65536);
        assert_eq!(config.max_idle_buffers, DEFAULT_MAX_IDLE_BUFFERS);

        assert!(PoolConfig::from_str_lines("colour = blue\n").is_err());
        assert!(PoolConfig::from_str_lines("audio_buffer_size\n").is_err());
    }

    #[test]
    fn test_config_file_on_disk() {
        let path = std::env::temp_dir().join(format!("tsdemux-config-{}.toml", std::process::id()));
        std::fs::write(&path, "max_idle_buffers = 9\n").unwrap();
        let config = PoolConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.max_idle_buffers, 9);
    }
}
