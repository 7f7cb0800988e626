//! Input tracking (pointer, keyboard, scroll)
//!
//! Raw hook callbacks arrive as hook-stamped `TimedInput` values on a channel,
//! are normalized by the `InputEventBuffer`, and are drained per frame window
//! by the synchronizer.

pub mod buffer;
pub mod channel;
pub mod scroll;
pub mod types;

pub use buffer::InputEventBuffer;
pub use channel::InputChannel;
pub use scroll::ScrollGestureDetector;
pub use types::{
    HeldState, InputEvent, Modifier, MouseButton, Position, RawInput, ScrollDirection,
    TimedInput,
};
