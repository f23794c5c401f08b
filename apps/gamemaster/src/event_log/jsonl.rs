//! One JSON object per line, synced to disk on every append.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{EventDraft, EventLog, LogEvent};
use crate::errors::DomainError;

struct Inner {
    file: File,
    next_seq: u64,
}

pub struct JsonlEventLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlEventLog {
    /// Open or create the log at `path`.
    ///
    /// A final line without a newline is the remains of an interrupted
    /// append; it is cut off. Any other unreadable line is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        let (events, complete_len) = parse_lines(&path, &raw)?;
        if complete_len < raw.len() {
            warn!(
                log_path = %path.display(),
                dropped_bytes = raw.len() - complete_len,
                "Truncating partial trailing log line"
            );
            file.set_len(complete_len as u64)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;

        let next_seq = events.last().map_or(1, |e| e.seq + 1);
        debug!(log_path = %path.display(), next_seq, "Opened event log");
        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, next_seq }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read the complete lines of the log at `path` without opening it for
/// writing. A running orchestrator may be mid-append; its partial line is
/// skipped, not cut.
pub fn read_snapshot(path: &Path) -> Result<Vec<LogEvent>, DomainError> {
    let raw = fs::read(path)?;
    let (events, _) = parse_lines(path, &raw)?;
    Ok(events)
}

impl EventLog for JsonlEventLog {
    fn append(&self, draft: EventDraft) -> Result<LogEvent, DomainError> {
        let mut inner = self.inner.lock();
        let event = LogEvent::from_draft(inner.next_seq, OffsetDateTime::now_utc(), draft);
        let mut line = serde_json::to_vec(&event)
            .map_err(|e| DomainError::storage(format!("cannot encode log event: {e}")))?;
        line.push(b'\n');
        inner.file.write_all(&line)?;
        inner.file.sync_data()?;
        inner.next_seq += 1;
        Ok(event)
    }

    fn events(&self) -> Result<Vec<LogEvent>, DomainError> {
        // Hold the lock so a concurrent append is never read half-written.
        let _guard = self.inner.lock();
        let raw = fs::read(&self.path)?;
        let (events, _) = parse_lines(&self.path, &raw)?;
        Ok(events)
    }
}

/// Parse every newline-terminated line. Returns the events and the byte
/// length they cover.
fn parse_lines(path: &Path, raw: &[u8]) -> Result<(Vec<LogEvent>, usize), DomainError> {
    let mut events: Vec<LogEvent> = Vec::new();
    let mut offset = 0;
    for (idx, chunk) in raw.split_inclusive(|b| *b == b'\n').enumerate() {
        if chunk.last() != Some(&b'\n') {
            break;
        }
        let line = &chunk[..chunk.len() - 1];
        offset += chunk.len();
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let event: LogEvent = serde_json::from_slice(line).map_err(|e| {
            DomainError::storage(format!("{}: line {}: {e}", path.display(), idx + 1))
        })?;
        let expected = events.last().map_or(1, |e| e.seq + 1);
        if event.seq != expected {
            return Err(DomainError::storage(format!(
                "{}: line {}: expected seq {expected}, found {}",
                path.display(),
                idx + 1,
                event.seq
            )));
        }
        events.push(event);
    }
    Ok((events, offset))
}
