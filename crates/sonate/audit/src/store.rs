//! Audit event stores. Write-once: the trait exposes append, read, and a
//! retention drain; nothing can edit a stored event.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::AuditError;
use crate::event::AuditEvent;

pub trait AuditStore: Send + Sync {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError>;

    fn events(&self) -> Result<Vec<AuditEvent>, AuditError>;

    fn count(&self) -> Result<usize, AuditError>;

    /// Remove and return every event whose retention deadline has passed.
    /// Used by the sweep to move events into the archive.
    fn take_expired(&self, now: DateTime<Utc>) -> Result<Vec<AuditEvent>, AuditError>;
}

/// In-memory store under a single lock.
pub struct MemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.write().push(event);
        Ok(())
    }

    fn events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self.events.read().clone())
    }

    fn count(&self) -> Result<usize, AuditError> {
        Ok(self.events.read().len())
    }

    fn take_expired(&self, now: DateTime<Utc>) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events = self.events.write();
        let (expired, kept): (Vec<_>, Vec<_>) = events
            .drain(..)
            .partition(|e| e.retention_deadline() <= now);
        *events = kept;
        Ok(expired)
    }
}

/// Append-only JSON-lines file store, one event per line. Suits archive
/// (cold) storage where events arrive via the sweep and are read rarely.
pub struct FileAuditStore {
    path: PathBuf,
    write_lock: RwLock<()>,
}

impl FileAuditStore {
    pub fn new(path: PathBuf) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::Store(e.to_string()))?;
        }
        Ok(Self {
            path,
            write_lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file =
            std::fs::File::open(&self.path).map_err(|e| AuditError::Store(e.to_string()))?;
        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| AuditError::Store(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent =
                serde_json::from_str(&line).map_err(|e| AuditError::Store(e.to_string()))?;
            events.push(event);
        }
        Ok(events)
    }
}

impl AuditStore for FileAuditStore {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        let _guard = self.write_lock.write();
        let json = serde_json::to_string(&event).map_err(|e| AuditError::Store(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::Store(e.to_string()))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| AuditError::Store(e.to_string()))
    }

    fn events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        let _guard = self.write_lock.read();
        self.read_all()
    }

    fn count(&self) -> Result<usize, AuditError> {
        Ok(self.events()?.len())
    }

    fn take_expired(&self, _now: DateTime<Utc>) -> Result<Vec<AuditEvent>, AuditError> {
        // The file store is the archive terminus; nothing expires out of it.
        Ok(Vec::new())
    }
}
