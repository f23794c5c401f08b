//! Directory-backed mailbox.
//!
//! Layout: `<root>/<recipient>/<phase label>/<message name>`. The tree is
//! world-readable; confidentiality comes from the ciphertext alone.
//!
//! A message is written to a hidden temp file first and then hard-linked to
//! its final name. `link` fails if the name exists, which makes claiming a
//! sequence number atomic across processes as well as threads.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::warn;
use ulid::Ulid;

use super::{MailboxStore, MessageQuery};
use crate::domain::message::sort_handles;
use crate::domain::{MessageDraft, MessageHandle, MessageName, ParticipantId, PhaseLabel, SeriesKey};
use crate::errors::DomainError;

pub struct FsMailbox {
    root: PathBuf,
}

impl FsMailbox {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, recipient: &ParticipantId, phase: PhaseLabel) -> PathBuf {
        self.root.join(recipient.as_str()).join(phase.to_string())
    }

    fn entries(dir: &Path) -> io::Result<Vec<MessageName>> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for entry in read {
            let entry = entry?;
            // Temp files and anything else foreign simply do not parse.
            if let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<MessageName>().ok())
            {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut dirs = Vec::new();
        for entry in read {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    fn last_seq(dir: &Path, series: &SeriesKey) -> io::Result<u32> {
        Ok(Self::entries(dir)?
            .into_iter()
            .filter(|n| &n.series() == series)
            .map(|n| n.seq)
            .max()
            .unwrap_or(0))
    }

    fn handle(dir: &Path, name: MessageName) -> io::Result<MessageHandle> {
        let meta = fs::metadata(dir.join(name.to_string()))?;
        let created_at = meta
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        Ok(MessageHandle {
            name,
            created_at,
            size: meta.len(),
        })
    }

    fn claim(tmp: &Path, dir: &Path, series: &SeriesKey) -> io::Result<MessageName> {
        let mut seq = Self::last_seq(dir, series)? + 1;
        loop {
            let name = MessageName::new(series, seq);
            match fs::hard_link(tmp, dir.join(name.to_string())) {
                Ok(()) => return Ok(name),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

impl MailboxStore for FsMailbox {
    fn append(&self, draft: &MessageDraft) -> Result<MessageHandle, DomainError> {
        let dir = self.dir(&draft.recipient, draft.phase);
        fs::create_dir_all(&dir)?;
        let series = draft.series();

        let tmp = dir.join(format!(".{}.{}.tmp", draft.sender, Ulid::new()));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&draft.ciphertext)?;
            file.sync_all()?;
        }
        let claimed = Self::claim(&tmp, &dir, &series);
        if let Err(e) = fs::remove_file(&tmp) {
            warn!(tmp_path = %tmp.display(), error = %e, "Failed to remove mailbox temp file");
        }
        let name = claimed?;
        Ok(Self::handle(&dir, name)?)
    }

    fn query(&self, query: &MessageQuery) -> Result<Vec<MessageHandle>, DomainError> {
        let recipient_dirs = match &query.recipient {
            Some(recipient) => vec![self.root.join(recipient.as_str())],
            None => Self::subdirs(&self.root)?,
        };
        let mut handles = Vec::new();
        for recipient_dir in recipient_dirs {
            let phase_dirs = match query.phase {
                Some(phase) => vec![recipient_dir.join(phase.to_string())],
                None => Self::subdirs(&recipient_dir)?,
            };
            for dir in phase_dirs {
                for name in Self::entries(&dir)? {
                    // A file only counts where its own name says it lives.
                    if query.matches(&name) && dir == self.dir(&name.recipient, name.phase) {
                        handles.push(Self::handle(&dir, name)?);
                    }
                }
            }
        }
        sort_handles(&mut handles);
        Ok(handles)
    }

    fn read(&self, name: &MessageName) -> Result<Vec<u8>, DomainError> {
        let path = self.dir(&name.recipient, name.phase).join(name.to_string());
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DomainError::invalid_address(format!("no message named {name}")),
            _ => DomainError::storage(format!("{}: {e}", path.display())),
        })
    }
}
