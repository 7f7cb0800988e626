//! On-disk session layout
//!
//! ```text
//! <window>_<YYYYmmdd_HHMMSS>/
//!   metadata.json       written once at start
//!   inputs.jsonl        one FrameRecord per line, sorted on close
//!   frame_000000.jpg    one image per persisted frame
//! ```

pub mod encode;
pub mod metadata;
pub mod reader;
pub mod record;
pub mod store;

pub use encode::{ImageCrateEncoder, ImageEncoder};
pub use metadata::SessionMetadata;
pub use reader::SessionReader;
pub use record::{frame_file_name, FrameRecord};
pub use store::{PersistStats, SessionStore, SessionSummary};
