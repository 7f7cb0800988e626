//! Recording channel trait
//!
//! Defines the lifecycle interface shared by the input and frame channels,
//! and the error type used throughout the crate.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Capture window not found: {0}")]
    WindowNotFound(String),

    #[error("Invalid crop box ({left}, {top}, {right}, {bottom}): right must be > left and bottom > top")]
    InvalidCropBox {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Trait for recording channels
///
/// Each channel owns the background threads for one side of the capture
/// (input or frames). Channels are started and stopped by the `Recorder`.
#[async_trait]
pub trait RecordingChannel: Send + Sync {
    /// Get the channel identifier (e.g., "input", "frames")
    fn id(&self) -> &str;

    /// Get the channel type
    fn channel_type(&self) -> ChannelType;

    /// Start the channel's worker threads
    async fn start(&mut self) -> RecordingResult<()>;

    /// Signal the workers to stop and join them
    async fn stop(&mut self) -> RecordingResult<()>;

    /// Check if the channel is currently recording
    fn is_recording(&self) -> bool;
}

/// Types of recording channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Input tracking (mouse, keyboard, scroll)
    Input,
    /// Frame scheduling and synchronization
    Frames,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Input => write!(f, "input"),
            ChannelType::Frames => write!(f, "frames"),
        }
    }
}

/// Join a worker thread, logging instead of propagating a panic.
pub(crate) fn join_worker(name: &str, handle: std::thread::JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("{} thread panicked", name);
    }
}
