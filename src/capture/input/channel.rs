use crate::capture::input::buffer::InputEventBuffer;
use crate::capture::input::types::TimedInput;
use crate::recorder::channel::{
    join_worker, ChannelType, RecordingChannel, RecordingError, RecordingResult,
};
use async_trait::async_trait;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex as ParkingMutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PUMP_TIMEOUT: Duration = Duration::from_millis(50);

/// Feeds raw hook callbacks into the `InputEventBuffer` and runs the scroll
/// inactivity watcher.
pub struct InputChannel {
    id: String,
    buffer: Arc<InputEventBuffer>,
    raw_inputs: Receiver<TimedInput>,
    scroll_poll_interval: Duration,
    is_recording: Arc<AtomicBool>,
    threads: ParkingMutex<Vec<(&'static str, std::thread::JoinHandle<()>)>>,
}

impl InputChannel {
    pub fn new(
        buffer: Arc<InputEventBuffer>,
        raw_inputs: Receiver<TimedInput>,
        scroll_poll_interval: Duration,
    ) -> Self {
        Self {
            id: "input".to_string(),
            buffer,
            raw_inputs,
            scroll_poll_interval,
            is_recording: Arc::new(AtomicBool::new(false)),
            threads: ParkingMutex::new(Vec::new()),
        }
    }

    pub fn buffer(&self) -> &Arc<InputEventBuffer> {
        &self.buffer
    }
}

fn run_pump(buffer: Arc<InputEventBuffer>, raw_inputs: Receiver<TimedInput>, running: Arc<AtomicBool>) {
    let mut handled: u64 = 0;
    while running.load(Ordering::Relaxed) {
        match raw_inputs.recv_timeout(PUMP_TIMEOUT) {
            Ok(timed) => {
                // A fault while handling one callback must not take the pump down.
                let result = catch_unwind(AssertUnwindSafe(|| {
                    buffer.handle_at(timed.input.clone(), timed.at)
                }));
                if result.is_err() {
                    tracing::error!("Input handler failed for {:?}", timed);
                }
                handled += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("Input hook disconnected");
                break;
            }
        }
    }
    tracing::info!("Input pump stopped ({} raw inputs)", handled);
}

fn run_scroll_watcher(buffer: Arc<InputEventBuffer>, poll_interval: Duration, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(poll_interval);
        buffer.poll_scroll_timeout();
    }
    tracing::debug!("Scroll watcher stopped");
}

#[async_trait]
impl RecordingChannel for InputChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Input
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.swap(true, Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }

        let pump = {
            let buffer = self.buffer.clone();
            let raw_inputs = self.raw_inputs.clone();
            let running = self.is_recording.clone();
            std::thread::Builder::new()
                .name("input-pump".into())
                .spawn(move || run_pump(buffer, raw_inputs, running))?
        };
        let watcher = {
            let buffer = self.buffer.clone();
            let interval = self.scroll_poll_interval;
            let running = self.is_recording.clone();
            std::thread::Builder::new()
                .name("scroll-watcher".into())
                .spawn(move || run_scroll_watcher(buffer, interval, running))?
        };

        let mut threads = self.threads.lock();
        threads.push(("input-pump", pump));
        threads.push(("scroll-watcher", watcher));

        tracing::info!(
            "Input channel started (scroll poll interval {:?})",
            self.scroll_poll_interval
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for (name, handle) in threads {
            join_worker(name, handle);
        }

        tracing::info!(
            "Input channel stopped ({} events still buffered)",
            self.buffer.pending_len()
        );
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }
}
