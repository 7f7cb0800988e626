//! Read access to a closed session, for replay and dataset tooling

use crate::recorder::channel::RecordingResult;
use crate::session::metadata::SessionMetadata;
use crate::session::record::FrameRecord;
use crate::session::store::{EVENT_LOG_FILE, METADATA_FILE};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SessionReader {
    dir: PathBuf,
    metadata: SessionMetadata,
    records: Vec<FrameRecord>,
}

impl SessionReader {
    pub fn open(dir: &Path) -> RecordingResult<Self> {
        let metadata: SessionMetadata =
            serde_json::from_slice(&fs::read(dir.join(METADATA_FILE))?)?;

        let content = fs::read_to_string(dir.join(EVENT_LOG_FILE))?;
        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<FrameRecord>)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded session {:?} with {} records", dir, records.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            metadata,
            records,
        })
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Look up a record; the log of a closed session is sorted by frame id.
    pub fn record(&self, frame_id: u64) -> Option<&FrameRecord> {
        self.records
            .binary_search_by_key(&frame_id, |r| r.frame_id)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Path of the frame image, if the record exists and its file is present.
    pub fn frame_path(&self, frame_id: u64) -> Option<PathBuf> {
        let path = self.dir.join(&self.record(frame_id)?.image);
        path.exists().then_some(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::window::WindowBounds;
    use crate::config::{CaptureConfig, ImageFormat};
    use crate::recorder::channel::RecordingError;
    use crate::session::record::frame_file_name;
    use tempfile::tempdir;

    fn write_session(dir: &Path, lines: &[String]) {
        let meta = SessionMetadata::new(
            &CaptureConfig::default(),
            WindowBounds {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
        );
        fs::write(dir.join(METADATA_FILE), serde_json::to_vec(&meta).unwrap()).unwrap();
        fs::write(dir.join(EVENT_LOG_FILE), lines.join("\n")).unwrap();
    }

    fn line(frame_id: u64) -> String {
        let record = FrameRecord {
            frame_id,
            tick_number: 0,
            frame_number: 0,
            abs_timestamp: 0.0,
            timestamp: 0.0,
            frame_timestamp: 0.0,
            inputs: Vec::new(),
            image: frame_file_name(frame_id, ImageFormat::Jpg),
        };
        serde_json::to_string(&record).unwrap()
    }

    #[test]
    fn test_open_and_lookup() {
        let dir = tempdir().expect("tempdir");
        write_session(dir.path(), &[line(0), line(1), line(4)]);
        fs::write(dir.path().join("frame_000004.jpg"), b"x").unwrap();

        let reader = SessionReader::open(dir.path()).expect("open");
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.metadata().frames_per_tick, 3);
        assert!(reader.record(4).is_some());
        assert!(reader.record(2).is_none());
        assert!(reader.frame_path(4).is_some());
        assert!(reader.frame_path(1).is_none());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let dir = tempdir().expect("tempdir");
        write_session(dir.path(), &[line(0), "{not json".to_string()]);
        assert!(matches!(
            SessionReader::open(dir.path()),
            Err(RecordingError::Serialization(_))
        ));
    }
}
