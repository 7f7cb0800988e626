//! Capture-side collaborators
//!
//! Frame and window seams implemented by platform backends, plus the input
//! pipeline that turns hook callbacks into timestamped events.

pub mod frame;
pub mod input;
pub mod window;

pub use frame::{CapturedFrame, FrameSource, LatestFrameSlot, TimedFrame};
pub use input::{InputChannel, InputEvent, InputEventBuffer, RawInput, TimedInput};
pub use window::{resolve_capture_region, CropBox, FixedWindow, WindowBounds, WindowLocator};
