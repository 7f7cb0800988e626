//! Session directory, persistence workers, and ordering on close
//!
//! Records are persisted by a bounded pool of worker threads, each of which
//! encodes its frame image and then appends one flushed line to the shared
//! event log. Workers finish in any order, so the log is only guaranteed to be
//! sorted by `frame_id` once `close` has rewritten it.

use crate::capture::frame::CapturedFrame;
use crate::config::ImageFormat;
use crate::recorder::channel::{join_worker, RecordingError, RecordingResult};
use crate::session::encode::ImageEncoder;
use crate::session::metadata::SessionMetadata;
use crate::session::record::FrameRecord;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex as ParkingMutex;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const METADATA_FILE: &str = "metadata.json";
pub const EVENT_LOG_FILE: &str = "inputs.jsonl";

struct PersistJob {
    frame: Arc<CapturedFrame>,
    record: FrameRecord,
}

#[derive(Debug, Default)]
pub struct PersistStats {
    written: AtomicU64,
    failed: AtomicU64,
}

impl PersistStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Outcome of a closed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub dir: PathBuf,
    /// Records in the final, sorted log
    pub records: usize,
    /// Records lost to encode or write failures
    pub failed: u64,
}

struct WorkerContext {
    dir: PathBuf,
    format: ImageFormat,
    encoder: Arc<dyn ImageEncoder>,
    log: Arc<ParkingMutex<Option<File>>>,
    stats: Arc<PersistStats>,
}

pub struct SessionStore {
    dir: PathBuf,
    log_path: PathBuf,
    format: ImageFormat,
    log: Arc<ParkingMutex<Option<File>>>,
    jobs: ParkingMutex<Option<Sender<PersistJob>>>,
    workers: ParkingMutex<Vec<std::thread::JoinHandle<()>>>,
    stats: Arc<PersistStats>,
}

impl SessionStore {
    /// Create the session directory under `root`, write the metadata, open the
    /// event log and start `workers` persistence threads.
    pub fn create(
        root: &Path,
        metadata: &SessionMetadata,
        workers: usize,
        encoder: Arc<dyn ImageEncoder>,
    ) -> RecordingResult<Self> {
        if workers == 0 {
            return Err(RecordingError::ConfigurationError(
                "SessionStore needs at least one worker".to_string(),
            ));
        }

        let dir = create_session_dir(root, metadata)?;
        fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(metadata)?)?;

        let log_path = dir.join(EVENT_LOG_FILE);
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        let log = Arc::new(ParkingMutex::new(Some(log_file)));
        let stats = Arc::new(PersistStats::default());

        let (tx, rx) = bounded::<PersistJob>(workers * 2);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let rx = rx.clone();
            let ctx = WorkerContext {
                dir: dir.clone(),
                format: metadata.image_format,
                encoder: encoder.clone(),
                log: log.clone(),
                stats: stats.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("persist-{}", index))
                .spawn(move || run_worker(rx, ctx))?;
            handles.push(handle);
        }

        tracing::info!(
            "Session {} created at {:?} ({} persistence workers)",
            metadata.session_id,
            dir,
            workers
        );

        Ok(Self {
            dir,
            log_path,
            format: metadata.image_format,
            log,
            jobs: ParkingMutex::new(Some(tx)),
            workers: ParkingMutex::new(handles),
            stats,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_format(&self) -> ImageFormat {
        self.format
    }

    pub fn stats(&self) -> Arc<PersistStats> {
        self.stats.clone()
    }

    /// Queue a record for persistence. Blocks while the pool is saturated.
    pub fn submit(&self, frame: Arc<CapturedFrame>, record: FrameRecord) -> RecordingResult<()> {
        let sender = self.jobs.lock().clone();
        let Some(sender) = sender else {
            tracing::warn!("Session closed, discarding frame {}", record.frame_id);
            return Err(RecordingError::NotRecording);
        };
        sender
            .send(PersistJob { frame, record })
            .map_err(|e| {
                RecordingError::CaptureError(format!(
                    "persistence pool unavailable for frame {}",
                    e.0.record.frame_id
                ))
            })
    }

    /// Drain the worker pool, close the log, and rewrite it ordered by
    /// `frame_id`.
    pub fn close(&self) -> RecordingResult<SessionSummary> {
        let Some(sender) = self.jobs.lock().take() else {
            return Err(RecordingError::NotRecording);
        };
        drop(sender);

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            join_worker("persist", handle);
        }

        if let Some(mut file) = self.log.lock().take() {
            file.flush()?;
        }

        let records = sort_event_log(&self.dir, &self.log_path)?;
        let summary = SessionSummary {
            dir: self.dir.clone(),
            records,
            failed: self.stats.failed(),
        };
        tracing::info!(
            "Session closed: {} records, {} failed, at {:?}",
            summary.records,
            summary.failed,
            summary.dir
        );
        Ok(summary)
    }
}

fn run_worker(rx: Receiver<PersistJob>, ctx: WorkerContext) {
    for job in rx.iter() {
        let frame_id = job.record.frame_id;
        match persist(&ctx, job) {
            Ok(()) => {
                ctx.stats.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to persist frame {}: {}", frame_id, e);
            }
        }
    }
}

fn persist(ctx: &WorkerContext, job: PersistJob) -> RecordingResult<()> {
    ctx.encoder
        .encode(&job.frame, ctx.format, &ctx.dir.join(&job.record.image))?;

    let mut line = serde_json::to_vec(&job.record)?;
    line.push(b'\n');

    let mut guard = ctx.log.lock();
    let file = guard.as_mut().ok_or(RecordingError::NotRecording)?;
    file.write_all(&line)?;
    file.flush()?;
    Ok(())
}

fn create_session_dir(root: &Path, metadata: &SessionMetadata) -> RecordingResult<PathBuf> {
    fs::create_dir_all(root)?;

    let base = format!(
        "{}_{}",
        sanitize_label(&metadata.capture_window),
        metadata.started_at.format("%Y%m%d_%H%M%S")
    );
    for attempt in 0..100 {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{}_{}", base, attempt)
        };
        let dir = root.join(name);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(RecordingError::ConfigurationError(format!(
        "Could not allocate a session directory for {} under {:?}",
        base, root
    )))
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}

#[derive(Deserialize)]
struct LogKey {
    frame_id: u64,
}

/// Rewrite the log sorted by `frame_id`, dropping malformed lines and
/// duplicate ids. Returns the number of records kept.
fn sort_event_log(dir: &Path, log_path: &Path) -> RecordingResult<usize> {
    let content = fs::read_to_string(log_path)?;

    let mut entries: Vec<(u64, &str)> = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogKey>(line) {
            Ok(key) => entries.push((key.frame_id, line)),
            Err(e) => tracing::warn!("Dropping malformed log line {}: {}", index + 1, e),
        }
    }

    entries.sort_by_key(|(id, _)| *id);
    let before = entries.len();
    entries.dedup_by_key(|(id, _)| *id);
    if entries.len() != before {
        tracing::warn!("Dropped {} duplicate log entries", before - entries.len());
    }

    let mut tmp = NamedTempFile::new_in(dir)?;
    for (_, line) in &entries {
        writeln!(tmp, "{}", line)?;
    }
    tmp.flush()?;
    tmp.persist(log_path).map_err(|e| RecordingError::IoError(e.error))?;

    Ok(entries.len())
}
