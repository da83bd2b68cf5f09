//! Durable message queue: pending FIFO backlog plus a bounded sent history.
//!
//! Both collections go through a [`QueueStore`]. Every read validates the raw
//! records and writes back a cleaned copy when something had to be dropped,
//! so a hand-edited or half-written file heals itself on the next access.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use nudge_core::error::{NudgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Collection, JsonFileStore, QueueStore};

/// Sent history keeps only this many entries.
pub const SENT_HISTORY_CAP: usize = 20;

/// One stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Local>,
}

impl QueueEntry {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            created_at: Local::now(),
        }
    }
}

/// Why a raw record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIssue {
    NotRecord,
    MissingMessage,
    MessageNotString,
    EmptyMessage,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotRecord => "not a record",
            Self::MissingMessage => "missing 'message' field",
            Self::MessageNotString => "'message' is not a string",
            Self::EmptyMessage => "empty message",
        };
        f.write_str(s)
    }
}

/// Turn one raw record into an entry.
pub fn parse_record(record: &Value) -> std::result::Result<QueueEntry, RecordIssue> {
    let obj = record.as_object().ok_or(RecordIssue::NotRecord)?;
    let message = obj.get("message").ok_or(RecordIssue::MissingMessage)?;
    let text = message.as_str().ok_or(RecordIssue::MessageNotString)?;
    if text.trim().is_empty() {
        return Err(RecordIssue::EmptyMessage);
    }
    let created_at = obj
        .get("timestamp")
        .and_then(parse_timestamp)
        .unwrap_or_else(Local::now);
    Ok(QueueEntry {
        text: text.to_string(),
        created_at,
    })
}

/// RFC 3339, or a naive ISO-8601 local time as older files store it.
fn parse_timestamp(v: &Value) -> Option<DateTime<Local>> {
    let s = v.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|n| n.and_local_timezone(Local).earliest())
}

/// Read-only health report of the pending collection.
#[derive(Debug, Clone, Default)]
pub struct QueueReport {
    pub total: usize,
    pub valid: usize,
    /// Structurally broken records (not a record, no text, text not a string).
    pub invalid: usize,
    pub empty: usize,
    pub duplicates: usize,
    /// Position in the raw file and what is wrong with it.
    pub issues: Vec<(usize, RecordIssue)>,
    /// Valid entries in queue order, duplicates included.
    pub entries: Vec<QueueEntry>,
}

/// Outcome of re-running message cleanup over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Entries whose text changed.
    pub rewritten: usize,
    /// Entries rejected by cleanup or duplicating an earlier one.
    pub removed: usize,
    /// Entries left in the queue.
    pub kept: usize,
}

impl CleanupSummary {
    pub fn changed(&self) -> bool {
        self.rewritten + self.removed > 0
    }
}

/// FIFO backlog of generated messages.
pub struct MessageQueue<S: QueueStore = JsonFileStore> {
    store: S,
}

impl<S: QueueStore> MessageQueue<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load and validate a collection. Never fails: unreadable data is empty.
    fn load(&self, collection: Collection) -> Vec<QueueEntry> {
        let raw = match self.store.load_all(collection) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("⚠️ Treating {:?} queue as empty: {e}", collection);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(raw.len());
        let mut dropped = 0;
        for (i, record) in raw.iter().enumerate() {
            match parse_record(record) {
                Ok(entry) => entries.push(entry),
                Err(issue) => {
                    tracing::warn!("⚠️ Dropping {:?} entry {i}: {issue}", collection);
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            tracing::info!("🩹 Removed {dropped} invalid {:?} entries, saving cleaned copy", collection);
            if let Err(e) = self.store.replace_all(collection, &entries) {
                tracing::error!("❌ Failed to persist cleaned {:?} queue: {e}", collection);
            }
        }
        entries
    }

    /// Append a message to the back of the queue.
    pub fn enqueue(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NudgeError::InvalidMessage("message is empty".into()));
        }

        let mut pending = self.load(Collection::Pending);
        if pending.iter().any(|e| e.text.trim() == text) {
            tracing::warn!("⚠️ Message already queued, not adding it twice");
            return Err(NudgeError::DuplicateMessage(text.to_string()));
        }

        pending.push(QueueEntry::new(text));
        self.store.replace_all(Collection::Pending, &pending)?;
        tracing::info!("📥 Added message to queue (total: {})", pending.len());
        Ok(())
    }

    /// Remove and return the oldest message.
    ///
    /// Corrupted records ahead of it are discarded by the load, so callers
    /// only ever see valid messages.
    pub fn dequeue_oldest(&self) -> Result<Option<String>> {
        let mut pending = self.load(Collection::Pending);
        if pending.is_empty() {
            tracing::warn!("⚠️ Queue is empty");
            return Ok(None);
        }

        let entry = pending.remove(0);
        self.store.replace_all(Collection::Pending, &pending)?;
        tracing::info!("📤 Retrieved oldest message (remaining: {})", pending.len());
        Ok(Some(entry.text.trim().to_string()))
    }

    pub fn count(&self) -> usize {
        self.load(Collection::Pending).len()
    }

    pub fn is_full(&self, target_size: usize) -> bool {
        self.count() >= target_size
    }

    /// How many messages are missing to reach `target_size`.
    pub fn needs_refill(&self, target_size: usize) -> usize {
        target_size.saturating_sub(self.count())
    }

    /// Remember a delivered message. Keeps the last [`SENT_HISTORY_CAP`].
    pub fn record_sent(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NudgeError::InvalidMessage("message is empty".into()));
        }

        let mut sent = self.load(Collection::Sent);
        sent.push(QueueEntry::new(text));
        if sent.len() > SENT_HISTORY_CAP {
            let excess = sent.len() - SENT_HISTORY_CAP;
            sent.drain(..excess);
        }
        self.store.replace_all(Collection::Sent, &sent)?;
        tracing::debug!("🗂️ Recorded sent message (history: {})", sent.len());
        Ok(())
    }

    /// The last `n` sent messages, oldest first.
    ///
    /// Before anything has been sent, the tail of the pending queue is used
    /// instead (read only).
    pub fn recent_sent_for_context(&self, n: usize) -> Vec<String> {
        let mut source = self.load(Collection::Sent);
        if source.is_empty() {
            source = self.load(Collection::Pending);
        }
        let skip = source.len().saturating_sub(n);
        source.into_iter().skip(skip).map(|e| e.text).collect()
    }

    /// Drop blank and duplicate pending entries (first occurrence wins).
    ///
    /// Returns how many records were removed. Only a failed write is an error.
    pub fn validate_and_repair(&self) -> Result<usize> {
        let raw = match self.store.load_all(Collection::Pending) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("⚠️ Cannot read queue for repair, treating as empty: {e}");
                return Ok(0);
            }
        };

        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(raw.len());
        for (i, record) in raw.iter().enumerate() {
            match parse_record(record) {
                Ok(entry) => {
                    if seen.insert(entry.text.trim().to_string()) {
                        kept.push(entry);
                    } else {
                        tracing::warn!("⚠️ Removing entry {i}: duplicate message");
                    }
                }
                Err(issue) => tracing::warn!("⚠️ Removing entry {i}: {issue}"),
            }
        }

        let removed = raw.len() - kept.len();
        if removed > 0 {
            self.store.replace_all(Collection::Pending, &kept)?;
            tracing::info!("🩹 Queue repaired: {removed} removed, {} kept", kept.len());
        } else {
            tracing::info!("✅ Queue is valid ({} messages)", kept.len());
        }
        Ok(removed)
    }

    /// Inspect the raw pending collection without changing it.
    /// Run `clean` over every queued message and save the result.
    ///
    /// Rejected messages are dropped, and so are rewrites that collide with an
    /// earlier entry. Timestamps are kept. Writes only when something changed.
    pub fn resanitize(&self, clean: impl Fn(&str) -> Option<String>) -> Result<CleanupSummary> {
        let (entries, summary) = self.cleaned_entries(&clean);
        if summary.changed() {
            self.store.replace_all(Collection::Pending, &entries)?;
            tracing::info!(
                "🧹 Queue cleaned: {} rewritten, {} removed, {} kept",
                summary.rewritten,
                summary.removed,
                summary.kept
            );
        } else {
            tracing::info!("✅ Queue already clean ({} messages)", summary.kept);
        }
        Ok(summary)
    }

    /// What [`resanitize`](Self::resanitize) would do, without saving it.
    pub fn resanitize_preview(&self, clean: impl Fn(&str) -> Option<String>) -> CleanupSummary {
        self.cleaned_entries(&clean).1
    }

    fn cleaned_entries(
        &self,
        clean: &impl Fn(&str) -> Option<String>,
    ) -> (Vec<QueueEntry>, CleanupSummary) {
        let mut summary = CleanupSummary::default();
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for (i, mut entry) in self.load(Collection::Pending).into_iter().enumerate() {
            let Some(text) = clean(&entry.text) else {
                tracing::warn!("⚠️ Removing entry {i}: rejected by cleanup");
                summary.removed += 1;
                continue;
            };
            if !seen.insert(text.trim().to_string()) {
                tracing::warn!("⚠️ Removing entry {i}: duplicate after cleanup");
                summary.removed += 1;
                continue;
            }
            if text != entry.text {
                tracing::debug!(
                    "Entry {i} rewritten: {} → {} chars",
                    entry.text.chars().count(),
                    text.chars().count()
                );
                summary.rewritten += 1;
                entry.text = text;
            }
            kept.push(entry);
        }

        summary.kept = kept.len();
        (kept, summary)
    }

    pub fn inspect(&self) -> Result<QueueReport> {
        let raw = self.store.load_all(Collection::Pending)?;
        let mut report = QueueReport {
            total: raw.len(),
            ..QueueReport::default()
        };
        let mut seen = HashSet::new();
        for (i, record) in raw.iter().enumerate() {
            match parse_record(record) {
                Ok(entry) => {
                    report.valid += 1;
                    if !seen.insert(entry.text.trim().to_string()) {
                        report.duplicates += 1;
                    }
                    report.entries.push(entry);
                }
                Err(issue) => {
                    if issue == RecordIssue::EmptyMessage {
                        report.empty += 1;
                    } else {
                        report.invalid += 1;
                    }
                    report.issues.push((i, issue));
                }
            }
        }
        Ok(report)
    }

    /// Pending entries in send order.
    pub fn pending(&self) -> Vec<QueueEntry> {
        self.load(Collection::Pending)
    }

    /// Sent history, oldest first.
    pub fn sent(&self) -> Vec<QueueEntry> {
        self.load(Collection::Sent)
    }

    /// Empty the pending queue. Returns how many messages were removed.
    pub fn clear(&self) -> Result<usize> {
        let count = self.count();
        self.store.replace_all(Collection::Pending, &[])?;
        tracing::info!("🗑️ Queue cleared ({count} removed)");
        Ok(count)
    }
}
