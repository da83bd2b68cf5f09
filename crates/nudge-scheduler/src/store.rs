//! File-based message store: lightweight persistence.
//! Collections are saved as human-readable, hand-editable JSON arrays.
//! Every write replaces the whole file; one process owns the directory.

use std::path::{Path, PathBuf};

use nudge_core::error::{NudgeError, Result};
use serde_json::Value;

use crate::queue::QueueEntry;

/// The two independent record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Messages waiting to be sent.
    Pending,
    /// Recently sent messages.
    Sent,
}

impl Collection {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Pending => "messages.json",
            Self::Sent => "sent_messages.json",
        }
    }
}

/// Load-all / replace-all repository behind the message queue.
///
/// `load_all` returns raw records so the queue can validate and repair them.
/// A missing collection is empty, not an error.
pub trait QueueStore {
    fn load_all(&self, collection: Collection) -> Result<Vec<Value>>;

    fn replace_all(&self, collection: Collection, entries: &[QueueEntry]) -> Result<()>;
}

/// JSON-file store: one pretty-printed array per collection.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store in `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            NudgeError::Storage(format!("Cannot create cache dir {}: {e}", dir.display()))
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    /// Copy a collection file next to itself as `<file>.backup`.
    ///
    /// Returns `None` when there is nothing to back up.
    pub fn backup(&self, collection: Collection) -> Result<Option<PathBuf>> {
        let file = self.path_for(collection);
        if !file.exists() {
            return Ok(None);
        }
        let backup = self.dir.join(format!("{}.backup", collection.file_name()));
        std::fs::copy(&file, &backup)
            .map_err(|e| NudgeError::Storage(format!("Backup of {} failed: {e}", file.display())))?;
        tracing::info!("💾 Backup written to {}", backup.display());
        Ok(Some(backup))
    }
}

impl QueueStore for JsonFileStore {
    fn load_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let file = self.path_for(collection);
        if !file.exists() {
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&file)
            .map_err(|e| NudgeError::Storage(format!("Read error {}: {e}", file.display())))?;
        match serde_json::from_str::<Value>(&json) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(other) => Err(NudgeError::Storage(format!(
                "{} is not a JSON array (found {})",
                file.display(),
                json_kind(&other)
            ))),
            Err(e) => Err(NudgeError::Storage(format!(
                "Failed to parse {}: {e}",
                file.display()
            ))),
        }
    }

    fn replace_all(&self, collection: Collection, entries: &[QueueEntry]) -> Result<()> {
        let file = self.path_for(collection);
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| NudgeError::Storage(format!("Serialize error: {e}")))?;
        std::fs::write(&file, json)
            .map_err(|e| NudgeError::Storage(format!("Write error {}: {e}", file.display())))?;
        tracing::debug!("💾 Saved {} entries to {}", entries.len(), file.display());
        Ok(())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
