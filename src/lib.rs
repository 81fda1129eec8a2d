#![doc(html_root_url = "https://docs.rs/tsdemux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsdemux - MPEG Transport Stream demuxing for adaptive streaming
//!
//! `tsdemux` turns the MPEG-2 Transport Stream segments delivered by HLS
//! into timestamped audio and video samples ready for a decoder.
//!
//! ## Features
//!
//! - Packet-aligned reading from any blocking [`std::io::Read`] source
//! - PAT/PMT discovery of the first program's streams
//! - PES reassembly of AAC, MPEG audio and H.264 access units
//! - 45 kHz presentation timestamps and random access flags per sample
//! - A sample buffer pool shared between demuxer instances
//! - HLS media playlist parsing for locating segments
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tsdemux = "0.1.0"
//! ```
//!
//! ### Demuxing a segment
//!
//! ```rust,no_run
//! use std::fs::File;
//! use tsdemux::{SamplePool, TSDemuxer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = SamplePool::default();
//!     let demuxer = TSDemuxer::new(File::open("segment0.ts")?, pool.clone())?;
//!
//!     for sample in demuxer {
//!         let sample = sample?;
//!         println!(
//!             "{} sample: pts={} key={} size={}",
//!             sample.category(),
//!             sample.pts(),
//!             sample.is_key(),
//!             sample.len()
//!         );
//!         pool.release(sample);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Walking a playlist
//!
//! ```rust,no_run
//! use tsdemux::format::hls::HLSPlaylist;
//! use url::Url;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let base = Url::parse("https://example.com/live/index.m3u8")?;
//!     let playlist = HLSPlaylist::parse(&base, &std::fs::read("index.m3u8")?)?;
//!     for segment in &playlist.segments {
//!         println!("{} at {:?}", segment.uri, segment.start_time);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: Samples and the buffer pool they are allocated from
//! - `format`: The transport stream demuxer and the HLS playlist parser
//! - `config`: Buffer pool sizing, from code, the environment or a file
//! - `error`: Error type and `Result` alias
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) facade: stream
//! selection at `info`, tolerated stream damage at `debug` and `warn`,
//! per-packet detail at `trace`.

/// Samples and the buffer pool backing them
pub mod av;

/// Buffer pool configuration
pub mod config;

/// Error types and utilities
pub mod error;

/// Container formats (TS, HLS)
pub mod format;

pub use av::{Sample, SamplePool, StreamCategory};
pub use config::PoolConfig;
pub use error::{DemuxError, Result};
pub use format::ts::TSDemuxer;
