use crate::clipboard::ClipboardFormat;
use crate::snapshot::ClipboardSnapshot;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

pub const HISTORY_FILE: &str = "clipboard_history.json";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Largest history the settings accept.
pub const MAX_HISTORY_LIMIT: usize = 10_000;

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    /// Capture time in milliseconds since the Unix epoch.
    #[serde(default)]
    timestamp: i64,
    formats: Vec<ClipboardFormat>,
}

/// Recent clipboard snapshots, oldest first, capped at `capacity`.
///
/// Empty snapshots are never stored.
#[derive(Debug, Clone)]
pub struct ClipboardHistory {
    entries: VecDeque<ClipboardSnapshot>,
    capacity: usize,
}

impl Default for ClipboardHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ClipboardHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest entries past the capacity.
    /// Returns `false` when the snapshot was empty and therefore dropped.
    pub fn push(&mut self, snapshot: ClipboardSnapshot) -> bool {
        if snapshot.is_empty() {
            tracing::debug!(id = snapshot.id(), "not adding empty snapshot to history");
            return false;
        }
        self.entries.push_back(snapshot);
        self.evict();
        true
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some(old) = self.entries.pop_front() {
                tracing::debug!(id = old.id(), "evicted clipboard history entry");
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&ClipboardSnapshot> {
        self.entries.iter().find(|s| s.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipboardSnapshot> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(ClipboardSnapshot::id).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Write the history to `path` as JSON.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let list: Vec<PersistedEntry> = self
            .entries
            .iter()
            .map(|s| PersistedEntry {
                timestamp: s.timestamp().timestamp_millis(),
                formats: s.formats().to_vec(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&list)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a history written by [`ClipboardHistory::save`].
    ///
    /// Entries get fresh snapshot ids in their stored order. A missing or
    /// empty file yields an empty history.
    pub fn load(path: &Path, capacity: usize) -> anyhow::Result<Self> {
        let mut history = Self::new(capacity);
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(history);
        }
        let list: Vec<PersistedEntry> = serde_json::from_str(&content)?;
        for entry in list {
            let timestamp = Utc
                .timestamp_millis_opt(entry.timestamp)
                .single()
                .unwrap_or_else(Utc::now);
            history.push(ClipboardSnapshot::from_parts(timestamp, entry.formats));
        }
        Ok(history)
    }
}
