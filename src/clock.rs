//! Wall-clock abstraction and the shared session start instant
//!
//! All timestamps in the crate are seconds since the UNIX epoch as `f64`,
//! matching what capture backends report for frame arrival.

use parking_lot::Mutex as ParkingMutex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time and of blocking sleeps
pub trait Clock: Send + Sync {
    /// Seconds since the UNIX epoch
    fn now(&self) -> f64;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Real system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests.
///
/// `sleep` advances time by the requested duration plus `overshoot`, which
/// simulates the scheduler waking late.
#[derive(Debug)]
pub struct ManualClock {
    now: ParkingMutex<f64>,
    overshoot: ParkingMutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: ParkingMutex::new(start),
            overshoot: ParkingMutex::new(0.0),
        }
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs;
    }

    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    pub fn set_overshoot(&self, secs: f64) {
        *self.overshoot.lock() = secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        let overshoot = *self.overshoot.lock();
        *self.now.lock() += duration.as_secs_f64() + overshoot;
    }
}

/// Session start instant, set exactly once and shared by all components.
#[derive(Debug, Clone, Default)]
pub struct SessionStart(Arc<OnceLock<f64>>);

impl SessionStart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start time if unset. Returns the effective start time.
    pub fn set_once(&self, at: f64) -> f64 {
        *self.0.get_or_init(|| at)
    }

    pub fn get(&self) -> Option<f64> {
        self.0.get().copied()
    }
}

/// Round to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
