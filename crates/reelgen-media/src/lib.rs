#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for slideshow rendering.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Slideshow composition with a concat-demuxer fallback
//! - Narration muxing and ffprobe metadata
//! - Placeholder slide rendering

pub mod command;
pub mod compositor;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod mux;
pub mod placeholder;
pub mod probe;
pub mod progress;
pub mod slideshow;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use compositor::{Compositor, FfmpegCompositor};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{copy_file, require_files};
pub use mux::{mux_narration, mux_with_fit, AudioFit};
pub use placeholder::{render_placeholder, render_text_background};
pub use probe::{probe_metadata, try_probe, MediaMetadata};
pub use progress::FfmpegProgress;
pub use slideshow::{ComposeOutcome, Slide, SlideshowRequest};
