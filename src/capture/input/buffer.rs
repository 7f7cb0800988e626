//! Input event buffer
//!
//! Normalizes raw hook callbacks into `InputEvent`s and queues them until the
//! synchronizer drains the window belonging to a frame. The queue, the held
//! state, and the scroll detector share one lock, held for a single event.

use crate::capture::input::scroll::ScrollGestureDetector;
use crate::capture::input::types::{
    HeldState, InputEvent, MouseButton, Position, RawInput, ScrollDirection,
};
use crate::capture::window::WindowBounds;
use crate::clock::{round_to, Clock, SessionStart};
use crate::recorder::channel::{RecordingError, RecordingResult};
use parking_lot::Mutex as ParkingMutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct BufferState {
    queue: VecDeque<InputEvent>,
    held: HeldState,
    scroll: ScrollGestureDetector,
    /// Last emitted (rounded) pointer position
    last_position: Position,
    bounds: WindowBounds,
}

pub struct InputEventBuffer {
    state: ParkingMutex<BufferState>,
    start: SessionStart,
    clock: Arc<dyn Clock>,
    precision: u32,
}

impl InputEventBuffer {
    pub fn new(
        start: SessionStart,
        clock: Arc<dyn Clock>,
        precision: u32,
        scroll_timeout: f64,
    ) -> Self {
        Self {
            state: ParkingMutex::new(BufferState {
                queue: VecDeque::new(),
                held: HeldState::default(),
                scroll: ScrollGestureDetector::new(scroll_timeout, precision),
                last_position: (0.0, 0.0),
                bounds: WindowBounds {
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                },
            }),
            start,
            clock,
            precision,
        }
    }

    /// Set the screen region positions are normalized against.
    pub fn set_window_bounds(&self, bounds: WindowBounds) -> RecordingResult<()> {
        if bounds.width == 0 || bounds.height == 0 {
            return Err(RecordingError::ConfigurationError(format!(
                "Window bounds must be non-empty, got {}x{}",
                bounds.width, bounds.height
            )));
        }
        self.state.lock().bounds = bounds;
        Ok(())
    }

    pub fn on_move(&self, x: f64, y: f64) {
        self.handle(RawInput::Move { x, y });
    }

    pub fn on_click(&self, x: f64, y: f64, button: MouseButton, pressed: bool) {
        self.handle(RawInput::Click {
            x,
            y,
            button,
            pressed,
        });
    }

    pub fn on_key_down(&self, key: &str) {
        self.handle(RawInput::KeyDown {
            key: key.to_string(),
        });
    }

    pub fn on_key_up(&self, key: &str) {
        self.handle(RawInput::KeyUp {
            key: key.to_string(),
        });
    }

    pub fn on_scroll(&self, dx: f64, dy: f64) {
        self.handle(RawInput::Scroll { dx, dy });
    }

    /// Process a raw input stamped with the current clock time.
    pub fn handle(&self, input: RawInput) {
        self.handle_at(input, self.clock.now());
    }

    /// Process a raw input carrying its native timestamp (seconds since epoch).
    pub fn handle_at(&self, input: RawInput, at: f64) {
        let Some(start) = self.start.get() else {
            return;
        };
        let rel = at - start;
        let timestamp = round_to(rel, self.precision);

        let mut state = self.state.lock();
        match input {
            RawInput::Move { x, y } => {
                let clamp = !state.held.mouse_middle;
                let position = self.round_pos(normalize(&state.bounds, x, y, clamp));
                if position == state.last_position {
                    return;
                }
                let old = state.last_position;
                state.last_position = position;
                let velocity = self.round_pos((position.0 - old.0, position.1 - old.1));
                state.queue.push_back(InputEvent::Move {
                    timestamp,
                    position,
                    velocity,
                });
            }
            RawInput::Click {
                x,
                y,
                button,
                pressed,
            } => {
                let clamp = !state.held.mouse_middle;
                let position = self.round_pos(normalize(&state.bounds, x, y, clamp));
                let modifiers = if pressed && button != MouseButton::Middle {
                    state.held.active_modifiers()
                } else {
                    Vec::new()
                };
                state.held.set_pressed(button, pressed);
                state.queue.push_back(InputEvent::Click {
                    timestamp,
                    position,
                    button,
                    pressed,
                    modifiers,
                });
            }
            RawInput::KeyDown { key } => {
                if state.held.keys.insert(key.clone()) {
                    state.queue.push_back(InputEvent::KeyPress { timestamp, key });
                }
            }
            RawInput::KeyUp { key } => {
                if state.held.keys.remove(&key) {
                    state.queue.push_back(InputEvent::KeyRelease { timestamp, key });
                }
            }
            RawInput::Scroll { dy, .. } => {
                if dy == 0.0 {
                    tracing::trace!("Ignoring horizontal-only scroll");
                    return;
                }
                let event = state.scroll.on_tick(rel, ScrollDirection::from_delta(dy));
                state.queue.push_back(event);
            }
        }
    }

    /// Emit a `ScrollStop` if the active burst has timed out.
    pub fn poll_scroll_timeout(&self) {
        let Some(start) = self.start.get() else {
            return;
        };
        let rel = self.clock.now() - start;
        let mut state = self.state.lock();
        if let Some(stop) = state.scroll.poll(rel) {
            tracing::trace!("Scroll burst ended: {:?}", stop);
            state.queue.push_back(stop);
        }
    }

    /// Drain the events that belong before `as_of_time`.
    ///
    /// Both bounds are absolute times. Events stamped at or after `as_of_time`
    /// stay queued, in order, for the next call. Events older than
    /// `last_frame_time` (late deliveries) are still returned rather than
    /// dropped. A `Held` snapshot stamped `as_of_time` is always appended.
    pub fn get_events_since(&self, last_frame_time: f64, as_of_time: f64) -> Vec<InputEvent> {
        let Some(start) = self.start.get() else {
            return vec![InputEvent::held(0.0, self.state.lock().held.clone())];
        };
        let window_start = last_frame_time - start;
        let window_end = as_of_time - start;

        let mut state = self.state.lock();
        let mut events = Vec::new();
        let mut kept = VecDeque::with_capacity(state.queue.len());
        for event in state.queue.drain(..) {
            let ts = event.timestamp();
            if ts < window_end {
                if ts < window_start {
                    tracing::debug!(
                        "Late input event at {:.4}s delivered in window starting {:.4}s",
                        ts,
                        window_start
                    );
                }
                events.push(event);
            } else {
                kept.push_back(event);
            }
        }
        state.queue = kept;

        events.push(InputEvent::held(
            round_to(window_end, self.precision),
            state.held.clone(),
        ));
        events
    }

    pub fn held_snapshot(&self) -> HeldState {
        self.state.lock().held.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn round_pos(&self, (x, y): Position) -> Position {
        (round_to(x, self.precision), round_to(y, self.precision))
    }
}

/// Map global pixels into the window's 0..1 space.
fn normalize(bounds: &WindowBounds, x: f64, y: f64, clamp: bool) -> Position {
    let local_x = (x - bounds.x as f64) / bounds.width as f64;
    let local_y = (y - bounds.y as f64) / bounds.height as f64;
    if clamp {
        (local_x.clamp(0.0, 1.0), local_y.clamp(0.0, 1.0))
    } else {
        (local_x, local_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::input::types::Modifier;
    use crate::clock::ManualClock;

    const START: f64 = 1_000.0;

    fn started_buffer() -> (InputEventBuffer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let start = SessionStart::new();
        start.set_once(START);
        let buffer = InputEventBuffer::new(start, clock.clone(), 4, 0.15);
        buffer
            .set_window_bounds(WindowBounds {
                x: 100,
                y: 100,
                width: 200,
                height: 100,
            })
            .unwrap();
        (buffer, clock)
    }

    fn drain_all(buffer: &InputEventBuffer) -> Vec<InputEvent> {
        let mut events = buffer.get_events_since(START, START + 1_000.0);
        events.pop(); // held snapshot
        events
    }

    #[test]
    fn test_inputs_ignored_before_start() {
        let clock = Arc::new(ManualClock::new(START));
        let buffer = InputEventBuffer::new(SessionStart::new(), clock, 4, 0.15);
        buffer.on_move(10.0, 10.0);
        buffer.on_key_down("a");
        assert_eq!(buffer.pending_len(), 0);

        let events = buffer.get_events_since(0.0, START);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], InputEvent::Held { timestamp, .. } if timestamp == 0.0));
    }

    #[test]
    fn test_move_dedup_is_idempotent() {
        let (buffer, clock) = started_buffer();
        buffer.on_move(200.0, 150.0);
        for _ in 0..5 {
            clock.advance(0.01);
            buffer.on_move(200.0, 150.0);
            // sub-pixel jitter that rounds to the same normalized position
            buffer.on_move(200.000_01, 150.0);
        }

        let events = drain_all(&buffer);
        assert_eq!(events.len(), 1);
        match &events[0] {
            InputEvent::Move {
                position, velocity, ..
            } => {
                assert_eq!(*position, (0.5, 0.5));
                assert_eq!(*velocity, (0.5, 0.5));
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn test_move_clamps_unless_middle_held() {
        let (buffer, _clock) = started_buffer();
        buffer.on_move(500.0, 0.0);
        buffer.on_click(150.0, 150.0, MouseButton::Middle, true);
        buffer.on_move(500.0, 50.0);

        let events = drain_all(&buffer);
        let positions: Vec<Position> = events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Move { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![(1.0, 0.0), (2.0, -0.5)]);
    }

    #[test]
    fn test_click_positions_clamped() {
        let (buffer, _clock) = started_buffer();
        let points = [(-50.0, 20.0), (1000.0, 1000.0), (150.0, 125.0), (99.0, 201.0)];
        for (x, y) in points {
            buffer.on_click(x, y, MouseButton::Left, true);
            buffer.on_click(x, y, MouseButton::Left, false);
        }

        for event in drain_all(&buffer) {
            if let InputEvent::Click { position, .. } = event {
                assert!((0.0..=1.0).contains(&position.0), "{:?}", position);
                assert!((0.0..=1.0).contains(&position.1), "{:?}", position);
            }
        }
    }

    #[test]
    fn test_click_captures_modifiers_on_press() {
        let (buffer, _clock) = started_buffer();
        buffer.on_key_down("shift_r");
        buffer.on_key_down("ctrl");
        buffer.on_click(150.0, 150.0, MouseButton::Left, true);
        buffer.on_click(150.0, 150.0, MouseButton::Left, false);
        buffer.on_click(150.0, 150.0, MouseButton::Middle, true);

        let clicks: Vec<InputEvent> = drain_all(&buffer)
            .into_iter()
            .filter(|e| matches!(e, InputEvent::Click { .. }))
            .collect();
        assert_eq!(clicks.len(), 3);
        assert!(matches!(&clicks[0], InputEvent::Click { modifiers, .. }
            if *modifiers == vec![Modifier::Shift, Modifier::Ctrl]));
        assert!(matches!(&clicks[1], InputEvent::Click { modifiers, .. } if modifiers.is_empty()));
        assert!(matches!(&clicks[2], InputEvent::Click { modifiers, .. } if modifiers.is_empty()));

        let held = buffer.held_snapshot();
        assert!(!held.mouse_left);
        assert!(held.mouse_middle);
    }

    #[test]
    fn test_key_press_and_release_deduplicated() {
        let (buffer, _clock) = started_buffer();
        buffer.on_key_down("w");
        buffer.on_key_down("w");
        buffer.on_key_up("w");
        buffer.on_key_up("w");
        buffer.on_key_up("q");

        let events = drain_all(&buffer);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], InputEvent::KeyPress { key, .. } if key == "w"));
        assert!(matches!(&events[1], InputEvent::KeyRelease { key, .. } if key == "w"));
        assert!(buffer.held_snapshot().keys.is_empty());
    }

    #[test]
    fn test_scroll_burst_through_buffer() {
        let (buffer, clock) = started_buffer();
        buffer.on_scroll(0.0, 0.0);
        for _ in 0..4 {
            buffer.on_scroll(0.0, 1.0);
            clock.advance(0.03);
            buffer.poll_scroll_timeout();
        }
        clock.advance(0.2);
        buffer.poll_scroll_timeout();
        buffer.poll_scroll_timeout();

        let events = drain_all(&buffer);
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], InputEvent::ScrollStart { .. }));
        assert!(matches!(
            events[4],
            InputEvent::ScrollStop {
                total_ticks: 4,
                ticks_up: 4,
                ticks_down: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_windows_partition_events() {
        let (buffer, _clock) = started_buffer();
        for (i, key) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            buffer.handle_at(
                RawInput::KeyDown {
                    key: key.to_string(),
                },
                START + 0.1 * i as f64,
            );
        }

        // [0.0, 0.25) then [0.25, 0.45)
        let first = buffer.get_events_since(START, START + 0.25);
        let second = buffer.get_events_since(START + 0.25, START + 0.45);

        let keys = |events: &[InputEvent]| -> Vec<String> {
            events
                .iter()
                .filter_map(|e| match e {
                    InputEvent::KeyPress { key, .. } => Some(key.clone()),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(keys(&first), vec!["a", "b", "c"]);
        assert_eq!(keys(&second), vec!["d", "e"]);
        assert_eq!(buffer.pending_len(), 1);

        match second.last() {
            Some(InputEvent::Held {
                timestamp, held, ..
            }) => {
                assert_eq!(*timestamp, 0.45);
                assert_eq!(held.keys.len(), 6);
            }
            other => panic!("expected held snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_late_events_are_not_lost() {
        let (buffer, _clock) = started_buffer();
        buffer.get_events_since(START, START + 0.5);
        buffer.handle_at(RawInput::KeyDown { key: "x".into() }, START + 0.2);

        let events = buffer.get_events_since(START + 0.5, START + 1.0);
        assert!(events
            .iter()
            .any(|e| matches!(e, InputEvent::KeyPress { key, .. } if key == "x")));
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_zero_size_bounds_rejected() {
        let (buffer, _clock) = started_buffer();
        let err = buffer.set_window_bounds(WindowBounds {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        });
        assert!(err.is_err());
    }
}
