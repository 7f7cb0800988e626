//! Tick Recorder - tick-aligned screen and input capture.
//!
//! Samples a game window at a fixed number of frames per server tick, pairs
//! each frame with the input events that happened since the previous one and
//! persists the result as a session directory for offline training.

pub mod capture;
pub mod clock;
pub mod config;
pub mod recorder;
pub mod session;

pub use capture::{
    CapturedFrame, CropBox, FixedWindow, FrameSource, InputEvent, LatestFrameSlot, RawInput,
    TimedFrame, TimedInput, WindowBounds, WindowLocator,
};
pub use clock::{Clock, ManualClock, SessionStart, SystemClock};
pub use config::{CaptureConfig, ImageFormat};
pub use recorder::{Recorder, RecordingError, RecordingResult};
pub use session::{FrameRecord, SessionReader, SessionSummary};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Does nothing if one is already set.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tick_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Tick Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
