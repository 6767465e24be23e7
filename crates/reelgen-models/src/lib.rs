//! Shared data models for the reelgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and submission options
//! - Slide styles (color grades, text anchors, transitions)
//! - Encoding configuration and quality tables
//! - Health probe results and audit records

pub mod encoding;
pub mod health;
pub mod job;
pub mod options;
pub mod style;

// Re-export common types
pub use encoding::{
    quality_profile, EncodingConfig, Orientation, Platform, QualityProfile, QualityTier, Resolution,
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_FPS, DEFAULT_SAMPLE_RATE, DEFAULT_VIDEO_CODEC,
};
pub use health::{HealthOutcome, ServiceErrorType, ServiceHealthRecord, TestResult};
pub use job::{Job, JobId, JobStatus};
pub use options::{JobOptions, SpeechProviderKind, ValidationError, VoiceOptions};
pub use style::{ColorGrade, SlideStyle, StyleParseError, TextPosition, Transition};
