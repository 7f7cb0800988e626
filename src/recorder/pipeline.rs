use crate::capture::frame::FrameSource;
use crate::recorder::channel::{
    join_worker, ChannelType, RecordingChannel, RecordingError, RecordingResult,
};
use crate::recorder::scheduler::{FrameRequest, FrameScheduler, SchedulerStats};
use crate::recorder::synchronizer::{FrameSynchronizer, SyncStats};
use async_trait::async_trait;
use crossbeam_channel::Receiver;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Frame channel: runs the scheduler and the synchronizer on their own
/// threads, connected by the bounded request queue.
///
/// Both halves are consumed on start, so a pipeline records once.
pub struct FramePipeline {
    id: String,
    source: Arc<dyn FrameSource>,
    scheduler: Option<FrameScheduler>,
    synchronizer: Option<FrameSynchronizer>,
    requests: Option<Receiver<FrameRequest>>,
    scheduler_stats: Arc<SchedulerStats>,
    sync_stats: Arc<SyncStats>,
    is_recording: Arc<AtomicBool>,
    scheduler_thread: ParkingMutex<Option<JoinHandle<()>>>,
    synchronizer_thread: ParkingMutex<Option<JoinHandle<()>>>,
}

impl FramePipeline {
    pub fn new(
        scheduler: FrameScheduler,
        synchronizer: FrameSynchronizer,
        requests: Receiver<FrameRequest>,
        source: Arc<dyn FrameSource>,
    ) -> Self {
        Self {
            id: "frames".to_string(),
            scheduler_stats: scheduler.stats(),
            sync_stats: synchronizer.stats(),
            source,
            scheduler: Some(scheduler),
            synchronizer: Some(synchronizer),
            requests: Some(requests),
            is_recording: Arc::new(AtomicBool::new(false)),
            scheduler_thread: ParkingMutex::new(None),
            synchronizer_thread: ParkingMutex::new(None),
        }
    }

    pub fn scheduler_stats(&self) -> Arc<SchedulerStats> {
        self.scheduler_stats.clone()
    }

    pub fn sync_stats(&self) -> Arc<SyncStats> {
        self.sync_stats.clone()
    }
}

#[async_trait]
impl RecordingChannel for FramePipeline {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Frames
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }
        let (Some(scheduler), Some(synchronizer), Some(requests)) = (
            self.scheduler.take(),
            self.synchronizer.take(),
            self.requests.take(),
        ) else {
            return Err(RecordingError::ConfigurationError(
                "frame pipeline has already run".to_string(),
            ));
        };
        self.is_recording.store(true, Ordering::SeqCst);

        let sync_handle = {
            let running = self.is_recording.clone();
            std::thread::Builder::new()
                .name("frame-sync".into())
                .spawn(move || synchronizer.run(requests, running))?
        };
        *self.synchronizer_thread.lock() = Some(sync_handle);

        let scheduler_handle = {
            let source = self.source.clone();
            let running = self.is_recording.clone();
            std::thread::Builder::new()
                .name("frame-scheduler".into())
                .spawn(move || scheduler.run(source, running))
        };
        match scheduler_handle {
            Ok(handle) => *self.scheduler_thread.lock() = Some(handle),
            Err(e) => {
                self.is_recording.store(false, Ordering::SeqCst);
                if let Some(handle) = self.synchronizer_thread.lock().take() {
                    join_worker("frame-sync", handle);
                }
                return Err(e.into());
            }
        }

        tracing::info!("Frame pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // Scheduler first: once it exits no new requests can be queued, and
        // the synchronizer drains whatever is left.
        if let Some(handle) = self.scheduler_thread.lock().take() {
            join_worker("frame-scheduler", handle);
        }
        if let Some(handle) = self.synchronizer_thread.lock().take() {
            join_worker("frame-sync", handle);
        }

        tracing::info!(
            "Frame pipeline stopped (issued={}, dropped={}, submitted={}, skipped={})",
            self.scheduler_stats.issued(),
            self.scheduler_stats.dropped(),
            self.sync_stats.submitted(),
            self.sync_stats.skipped()
        );
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }
}
