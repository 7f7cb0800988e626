//! Recording coordinator
//!
//! Wires the input channel and the frame pipeline to a session store and
//! drives their lifecycle.

pub mod channel;
pub mod pipeline;
pub mod scheduler;
pub mod synchronizer;

pub use channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
pub use pipeline::FramePipeline;
pub use scheduler::{frame_request_queue, FrameRequest, FrameScheduler, SchedulerStats, StepOutcome};
pub use synchronizer::{FrameSynchronizer, SyncOutcome, SyncStats};

use crate::capture::frame::FrameSource;
use crate::capture::input::{InputChannel, InputEventBuffer, TimedInput};
use crate::capture::window::{resolve_capture_region, WindowLocator};
use crate::clock::{Clock, SessionStart, SystemClock};
use crate::config::CaptureConfig;
use crate::session::encode::{ImageCrateEncoder, ImageEncoder};
use crate::session::metadata::SessionMetadata;
use crate::session::store::{SessionStore, SessionSummary};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct ActiveSession {
    channels: Vec<Box<dyn RecordingChannel>>,
    store: Arc<SessionStore>,
    buffer: Arc<InputEventBuffer>,
    scheduler_stats: Arc<SchedulerStats>,
}

/// Owns one recording at a time.
pub struct Recorder {
    config: CaptureConfig,
    clock: Arc<dyn Clock>,
    encoder: Arc<dyn ImageEncoder>,
    active: Option<ActiveSession>,
}

impl Recorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            encoder: Arc::new(ImageCrateEncoder::default()),
            active: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_dir(&self) -> Option<&Path> {
        self.active.as_ref().map(|s| s.store.dir())
    }

    /// Buffer of the running session, for hosts that deliver hook callbacks
    /// directly instead of through the raw input channel.
    pub fn input_buffer(&self) -> Option<Arc<InputEventBuffer>> {
        self.active.as_ref().map(|s| s.buffer.clone())
    }

    pub fn scheduler_stats(&self) -> Option<Arc<SchedulerStats>> {
        self.active.as_ref().map(|s| s.scheduler_stats.clone())
    }

    /// Validate the configuration, create the session and start capturing.
    /// Returns the session directory.
    pub async fn start(
        &mut self,
        locator: &dyn WindowLocator,
        frame_source: Arc<dyn FrameSource>,
        raw_inputs: Receiver<TimedInput>,
    ) -> RecordingResult<PathBuf> {
        if self.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        self.config.validate()?;
        let region =
            resolve_capture_region(locator, &self.config.capture_window, self.config.crop_box)?;
        let metadata = SessionMetadata::new(&self.config, region);
        let store = Arc::new(SessionStore::create(
            &self.config.save_dir,
            &metadata,
            self.config.max_workers,
            self.encoder.clone(),
        )?);

        let session_start = SessionStart::new();
        let buffer = Arc::new(InputEventBuffer::new(
            session_start.clone(),
            self.clock.clone(),
            self.config.round_precision,
            self.config.scroll_stop_timeout_secs,
        ));
        buffer.set_window_bounds(region)?;

        let (tx, rx) = frame_request_queue(self.config.frames_per_tick);
        let scheduler = FrameScheduler::new(
            self.config.tick_rate,
            self.config.frames_per_tick,
            self.clock.clone(),
            session_start.clone(),
            tx,
        );
        let scheduler_stats = scheduler.stats();
        let synchronizer = FrameSynchronizer::new(
            buffer.clone(),
            frame_source.clone(),
            store.clone(),
            session_start,
            self.config.frame_epsilon_secs,
            self.config.round_precision,
        );

        let candidates: Vec<Box<dyn RecordingChannel>> = vec![
            Box::new(InputChannel::new(
                buffer.clone(),
                raw_inputs,
                self.config.scroll_poll_interval(),
            )),
            Box::new(FramePipeline::new(scheduler, synchronizer, rx, frame_source)),
        ];

        let mut channels: Vec<Box<dyn RecordingChannel>> = Vec::with_capacity(candidates.len());
        for mut channel in candidates {
            if let Err(e) = channel.start().await {
                tracing::error!("Failed to start {} channel: {}", channel.channel_type(), e);
                for started in channels.iter_mut().rev() {
                    if let Err(stop_err) = started.stop().await {
                        tracing::warn!("Failed to stop {} channel: {}", started.id(), stop_err);
                    }
                }
                let store = store.clone();
                if let Err(close_err) = tokio::task::spawn_blocking(move || store.close())
                    .await
                    .map_err(|e| RecordingError::CaptureError(e.to_string()))
                    .and_then(|r| r)
                {
                    tracing::warn!("Failed to close aborted session: {}", close_err);
                }
                return Err(e);
            }
            channels.push(channel);
        }

        let dir = store.dir().to_path_buf();
        tracing::info!(
            "Recording '{}' into {:?} ({} frames every {}s)",
            self.config.capture_window,
            dir,
            self.config.frames_per_tick,
            self.config.tick_rate
        );

        self.active = Some(ActiveSession {
            channels,
            store,
            buffer,
            scheduler_stats,
        });
        Ok(dir)
    }

    /// Stop all channels in reverse start order, then close the store.
    pub async fn stop(&mut self) -> RecordingResult<SessionSummary> {
        let mut session = self.active.take().ok_or(RecordingError::NotRecording)?;

        for channel in session.channels.iter_mut().rev() {
            if let Err(e) = channel.stop().await {
                tracing::warn!("Failed to stop {} channel: {}", channel.id(), e);
            }
        }
        // Drop the channels so the pipeline's store handle goes with them.
        drop(session.channels);

        let store = session.store;
        let summary = tokio::task::spawn_blocking(move || store.close())
            .await
            .map_err(|e| RecordingError::CaptureError(format!("store close panicked: {}", e)))??;

        tracing::info!(
            "Recording stopped: {} records in {:?} ({} failed, {} dropped)",
            summary.records,
            summary.dir,
            summary.failed,
            session.scheduler_stats.dropped()
        );
        Ok(summary)
    }
}
