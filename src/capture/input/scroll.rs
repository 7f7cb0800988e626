//! Scroll gesture segmentation
//!
//! Turns a raw stream of wheel ticks into start/tick/stop events. A burst ends
//! once no tick has arrived for longer than the inactivity timeout; `poll` is
//! driven by a watcher on a short fixed interval, so stop latency is bounded by
//! that interval rather than by tick arrival.

use crate::capture::input::types::{InputEvent, ScrollDirection};
use crate::clock::round_to;

#[derive(Debug, Clone, PartialEq)]
struct ScrollSession {
    started_at: f64,
    last_tick_at: f64,
    ticks_up: u32,
    ticks_down: u32,
    last_direction: ScrollDirection,
}

impl ScrollSession {
    fn count(&mut self, direction: ScrollDirection) {
        match direction {
            ScrollDirection::Up => self.ticks_up += 1,
            ScrollDirection::Down => self.ticks_down += 1,
        }
    }
}

#[derive(Debug)]
pub struct ScrollGestureDetector {
    timeout: f64,
    precision: u32,
    /// `Some` exactly while a burst is active
    session: Option<ScrollSession>,
}

impl ScrollGestureDetector {
    pub fn new(timeout: f64, precision: u32) -> Self {
        Self {
            timeout,
            precision,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Feed one wheel tick at session-relative time `now`.
    pub fn on_tick(&mut self, now: f64, direction: ScrollDirection) -> InputEvent {
        let timestamp = round_to(now, self.precision);
        match self.session.as_mut() {
            None => {
                let mut session = ScrollSession {
                    started_at: now,
                    last_tick_at: now,
                    ticks_up: 0,
                    ticks_down: 0,
                    last_direction: direction,
                };
                session.count(direction);
                self.session = Some(session);
                InputEvent::ScrollStart {
                    timestamp,
                    direction,
                }
            }
            Some(session) => {
                let direction_change = direction != session.last_direction;
                session.count(direction);
                session.last_direction = direction;
                session.last_tick_at = now;
                InputEvent::ScrollTick {
                    timestamp,
                    direction,
                    direction_change,
                }
            }
        }
    }

    /// Close the active burst if it has been idle longer than the timeout.
    pub fn poll(&mut self, now: f64) -> Option<InputEvent> {
        let idle = now - self.session.as_ref()?.last_tick_at;
        if idle <= self.timeout {
            return None;
        }

        let session = self.session.take()?;
        Some(InputEvent::ScrollStop {
            timestamp: round_to(now, self.precision),
            duration: round_to(session.last_tick_at - session.started_at, self.precision),
            total_ticks: session.ticks_up + session.ticks_down,
            ticks_up: session.ticks_up,
            ticks_down: session.ticks_down,
        })
    }
}
