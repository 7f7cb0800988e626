//! Frame/input synchronizer
//!
//! Pairs each scheduled slot with the latest captured frame and the input
//! events that fall before that frame, then hands the merged record to the
//! session store. `last_frame_time` threads consecutive windows together so
//! every input event lands in exactly one record.

use crate::capture::frame::{FrameSource, TimedFrame};
use crate::capture::input::buffer::InputEventBuffer;
use crate::capture::input::types::InputEvent;
use crate::clock::{round_to, SessionStart};
use crate::recorder::scheduler::FrameRequest;
use crate::session::record::{frame_file_name, FrameRecord};
use crate::session::store::SessionStore;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct SyncStats {
    submitted: AtomicU64,
    skipped: AtomicU64,
}

impl SyncStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Requests discarded because no frame was available
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Submitted,
    NoFrame,
    Rejected,
}

pub struct FrameSynchronizer {
    buffer: Arc<InputEventBuffer>,
    source: Arc<dyn FrameSource>,
    store: Arc<SessionStore>,
    session_start: SessionStart,
    epsilon: f64,
    precision: u32,
    last_frame_time: Option<f64>,
    stats: Arc<SyncStats>,
}

impl FrameSynchronizer {
    pub fn new(
        buffer: Arc<InputEventBuffer>,
        source: Arc<dyn FrameSource>,
        store: Arc<SessionStore>,
        session_start: SessionStart,
        epsilon: f64,
        precision: u32,
    ) -> Self {
        Self {
            buffer,
            source,
            store,
            session_start,
            epsilon,
            precision,
            last_frame_time: None,
            stats: Arc::new(SyncStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SyncStats> {
        self.stats.clone()
    }

    pub fn last_frame_time(&self) -> Option<f64> {
        self.last_frame_time
    }

    pub fn handle(&mut self, request: FrameRequest) -> SyncOutcome {
        let (Some(start), Some(TimedFrame { frame, timestamp })) =
            (self.session_start.get(), self.source.latest_frame())
        else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("No frame available for frame {}, skipping", request.frame_id);
            return SyncOutcome::NoFrame;
        };

        let window_start = self.last_frame_time.unwrap_or(start);
        let mut inputs = self
            .buffer
            .get_events_since(window_start, timestamp - self.epsilon);
        for event in inputs.iter_mut() {
            if let InputEvent::Held {
                frame_id,
                tick_number,
                frame_number,
                ..
            } = event
            {
                *frame_id = Some(request.frame_id);
                *tick_number = Some(request.tick_number);
                *frame_number = Some(request.frame_number);
            }
        }

        let record = FrameRecord {
            frame_id: request.frame_id,
            tick_number: request.tick_number,
            frame_number: request.frame_number,
            abs_timestamp: round_to(request.issued_at, self.precision),
            timestamp: round_to(request.issued_at - start, self.precision),
            frame_timestamp: round_to(timestamp - start, self.precision),
            inputs,
            image: frame_file_name(request.frame_id, self.store.image_format()),
        };
        self.last_frame_time = Some(timestamp);

        match self.store.submit(frame, record) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                SyncOutcome::Submitted
            }
            Err(e) => {
                tracing::error!("Frame {} not persisted: {}", request.frame_id, e);
                SyncOutcome::Rejected
            }
        }
    }

    /// Synchronizer thread body. Requests still queued at stop are processed
    /// before returning.
    pub fn run(mut self, requests: Receiver<FrameRequest>, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            match requests.recv_timeout(RECV_TIMEOUT) {
                Ok(request) => {
                    self.handle(request);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for request in requests.try_iter() {
            self.handle(request);
        }

        tracing::info!(
            "Synchronizer stopped (submitted={}, skipped={})",
            self.stats.submitted(),
            self.stats.skipped()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{CapturedFrame, LatestFrameSlot};
    use crate::capture::input::types::RawInput;
    use crate::capture::window::WindowBounds;
    use crate::clock::ManualClock;
    use crate::config::CaptureConfig;
    use crate::session::encode::ImageCrateEncoder;
    use crate::session::metadata::SessionMetadata;
    use crate::session::reader::SessionReader;
    use tempfile::{tempdir, TempDir};

    const START: f64 = 2_000.0;

    struct Fixture {
        _root: TempDir,
        clock: Arc<ManualClock>,
        buffer: Arc<InputEventBuffer>,
        slot: Arc<LatestFrameSlot>,
        store: Arc<SessionStore>,
        sync: FrameSynchronizer,
    }

    fn fixture() -> Fixture {
        let root = tempdir().expect("tempdir");
        let clock = Arc::new(ManualClock::new(START));
        let start = SessionStart::new();
        start.set_once(START);

        let bounds = WindowBounds {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let buffer = Arc::new(InputEventBuffer::new(start.clone(), clock.clone(), 4, 0.15));
        buffer.set_window_bounds(bounds).unwrap();
        let slot = Arc::new(LatestFrameSlot::new());
        let store = Arc::new(
            SessionStore::create(
                root.path(),
                &SessionMetadata::new(&CaptureConfig::default(), bounds),
                2,
                Arc::new(ImageCrateEncoder::default()),
            )
            .unwrap(),
        );
        let sync = FrameSynchronizer::new(
            buffer.clone(),
            slot.clone(),
            store.clone(),
            start,
            0.001,
            4,
        );
        Fixture {
            _root: root,
            clock,
            buffer,
            slot,
            store,
            sync,
        }
    }

    fn request(frame_id: u64, at: f64) -> FrameRequest {
        FrameRequest {
            frame_id,
            tick_number: frame_id / 3,
            frame_number: (frame_id % 3) as u32,
            scheduled_deadline: at,
            issued_at: at,
        }
    }

    fn frame() -> CapturedFrame {
        CapturedFrame::from_rgb(vec![10; 4 * 4 * 3], 4, 4).unwrap()
    }

    #[test]
    fn test_no_frame_is_skipped() {
        let mut f = fixture();
        assert_eq!(f.sync.handle(request(0, START)), SyncOutcome::NoFrame);
        assert_eq!(f.sync.stats().skipped(), 1);
        assert_eq!(f.sync.last_frame_time(), None);

        let summary = f.store.close().unwrap();
        assert_eq!(summary.records, 0);
    }

    #[test]
    fn test_events_windowed_by_frame_time() {
        let mut f = fixture();

        f.buffer
            .handle_at(RawInput::KeyDown { key: "a".into() }, START + 0.05);
        // stamped within epsilon of the frame: belongs to the next window
        f.buffer
            .handle_at(RawInput::KeyDown { key: "b".into() }, START + 0.1995);
        f.slot.publish(frame(), START + 0.2);
        f.clock.set(START + 0.2);
        assert_eq!(f.sync.handle(request(0, START + 0.2)), SyncOutcome::Submitted);
        assert_eq!(f.sync.last_frame_time(), Some(START + 0.2));

        f.buffer
            .handle_at(RawInput::KeyDown { key: "c".into() }, START + 0.3);
        f.slot.publish(frame(), START + 0.4);
        assert_eq!(f.sync.handle(request(1, START + 0.4)), SyncOutcome::Submitted);

        let summary = f.store.close().unwrap();
        let reader = SessionReader::open(&summary.dir).unwrap();
        assert_eq!(reader.len(), 2);

        let keys = |frame_id: u64| -> Vec<String> {
            reader
                .record(frame_id)
                .unwrap()
                .inputs
                .iter()
                .filter_map(|e| match e {
                    InputEvent::KeyPress { key, .. } => Some(key.clone()),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(keys(0), vec!["a"]);
        assert_eq!(keys(1), vec!["b", "c"]);

        let first = reader.record(0).unwrap();
        assert_eq!(first.timestamp, 0.2);
        assert_eq!(first.frame_timestamp, 0.2);
        assert_eq!(first.image, "frame_000000.jpg");
        match first.inputs.last() {
            Some(InputEvent::Held {
                frame_id,
                tick_number,
                frame_number,
                timestamp,
                ..
            }) => {
                assert_eq!(*frame_id, Some(0));
                assert_eq!(*tick_number, Some(0));
                assert_eq!(*frame_number, Some(0));
                assert_eq!(*timestamp, 0.199);
            }
            other => panic!("expected held snapshot, got {:?}", other),
        }
        assert!(reader.frame_path(1).is_some());
    }

    #[test]
    fn test_run_drains_queue_after_stop() {
        let f = fixture();
        f.slot.publish(frame(), START + 0.1);

        let (tx, rx) = crossbeam_channel::bounded(8);
        for id in 0..3 {
            tx.send(request(id, START + id as f64 * 0.2)).unwrap();
        }
        let stats = f.sync.stats();
        f.sync.run(rx, Arc::new(AtomicBool::new(false)));

        assert_eq!(stats.submitted(), 3);
        assert_eq!(f.store.close().unwrap().records, 3);
    }
}
