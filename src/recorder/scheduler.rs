//! Drift-corrected frame scheduler
//!
//! Every deadline is computed from the session start (`start + frame_id *
//! interval`) rather than from the previous wake-up, so late wake-ups never
//! accumulate. Requests go into a bounded queue; when it is full the slot is
//! dropped and counted, and `frame_id` still advances so that ids keep a fixed
//! mapping to wall-clock slots.

use crate::capture::frame::FrameSource;
use crate::clock::{Clock, SessionStart};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const FIRST_FRAME_POLL: Duration = Duration::from_millis(10);

/// Absorbs float error so a slot landing exactly on a tick boundary is not
/// attributed to the previous tick.
const TICK_EPSILON: f64 = 1e-6;

/// One scheduled sampling slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRequest {
    pub frame_id: u64,
    pub tick_number: u64,
    pub frame_number: u32,
    /// Intended wall-clock time of this slot
    pub scheduled_deadline: f64,
    /// Actual wall-clock time the scheduler woke for this slot
    pub issued_at: f64,
}

/// Create the request queue, sized to two ticks' worth of slots.
pub fn frame_request_queue(frames_per_tick: u32) -> (Sender<FrameRequest>, Receiver<FrameRequest>) {
    bounded(2 * frames_per_tick.max(1) as usize)
}

#[derive(Debug, Default)]
pub struct SchedulerStats {
    issued: AtomicU64,
    dropped: AtomicU64,
    last_drift_us: AtomicI64,
}

impl SchedulerStats {
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drift of the most recent slot, in seconds
    pub fn last_drift(&self) -> f64 {
        self.last_drift_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Submitted(FrameRequest),
    Dropped(FrameRequest),
    Disconnected,
}

pub struct FrameScheduler {
    tick_rate: f64,
    frames_per_tick: u32,
    interval: f64,
    clock: Arc<dyn Clock>,
    session_start: SessionStart,
    sender: Sender<FrameRequest>,
    stats: Arc<SchedulerStats>,
    start_time: Option<f64>,
    next_frame_id: u64,
}

impl FrameScheduler {
    pub fn new(
        tick_rate: f64,
        frames_per_tick: u32,
        clock: Arc<dyn Clock>,
        session_start: SessionStart,
        sender: Sender<FrameRequest>,
    ) -> Self {
        let frames_per_tick = frames_per_tick.max(1);
        Self {
            tick_rate,
            frames_per_tick,
            interval: tick_rate / frames_per_tick as f64,
            clock,
            session_start,
            sender,
            stats: Arc::new(SchedulerStats::default()),
            start_time: None,
            next_frame_id: 0,
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    pub fn next_frame_id(&self) -> u64 {
        self.next_frame_id
    }

    /// Fix the schedule origin. The shared session start wins if it was
    /// already set elsewhere.
    pub fn start_at(&mut self, at: f64) -> f64 {
        let start = self.session_start.set_once(at);
        self.start_time = Some(start);
        start
    }

    /// Block until the frame source has produced a frame, then start the
    /// schedule. Returns `None` if stopped first.
    pub fn wait_for_first_frame(&mut self, source: &dyn FrameSource, running: &AtomicBool) -> Option<f64> {
        while running.load(Ordering::Relaxed) {
            if source.frame_count() > 0 {
                let start = self.start_at(self.clock.now());
                tracing::info!("First frame received, schedule starts at {:.4}", start);
                return Some(start);
            }
            self.clock.sleep(FIRST_FRAME_POLL);
        }
        None
    }

    /// Sleep until the next slot and submit its request.
    pub fn step(&mut self) -> StepOutcome {
        let start = match self.start_time {
            Some(start) => start,
            None => self.start_at(self.clock.now()),
        };

        let frame_id = self.next_frame_id;
        let deadline = start + frame_id as f64 * self.interval;
        let now = self.clock.now();
        if deadline > now {
            self.clock.sleep(Duration::from_secs_f64(deadline - now));
        }

        let issued_at = self.clock.now();
        let drift = issued_at - deadline;
        self.stats
            .last_drift_us
            .store((drift * 1_000_000.0) as i64, Ordering::Relaxed);
        tracing::trace!("Frame {} drift: {:.6}s", frame_id, drift);

        let elapsed = issued_at - start;
        let request = FrameRequest {
            frame_id,
            tick_number: (elapsed / self.tick_rate + TICK_EPSILON).floor().max(0.0) as u64,
            frame_number: (frame_id % self.frames_per_tick as u64) as u32,
            scheduled_deadline: deadline,
            issued_at,
        };
        self.next_frame_id += 1;

        match self.sender.try_send(request) {
            Ok(()) => {
                self.stats.issued.fetch_add(1, Ordering::Relaxed);
                StepOutcome::Submitted(request)
            }
            Err(TrySendError::Full(request)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Frame queue full, dropping frame {}", request.frame_id);
                StepOutcome::Dropped(request)
            }
            Err(TrySendError::Disconnected(_)) => StepOutcome::Disconnected,
        }
    }

    /// Scheduler thread body.
    pub fn run(mut self, source: Arc<dyn FrameSource>, running: Arc<AtomicBool>) {
        if self.wait_for_first_frame(source.as_ref(), &running).is_none() {
            tracing::info!("Scheduler stopped before the first frame arrived");
            return;
        }

        while running.load(Ordering::Relaxed) {
            if self.step() == StepOutcome::Disconnected {
                tracing::warn!("Frame request queue disconnected, stopping scheduler");
                break;
            }
        }

        tracing::info!(
            "Scheduler stopped (issued={}, dropped={}, last drift={:.6}s)",
            self.stats.issued(),
            self.stats.dropped(),
            self.stats.last_drift()
        );
    }
}
