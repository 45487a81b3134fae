use crate::clipboard::{ClipboardBackend, ClipboardFormat, RawFormat, RetryPolicy};
use crate::error::{ClipboardError, FormatError};
use crate::preview::{self, IconCategory};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError};

static NEXT_SNAPSHOT_ID: Lazy<Mutex<u64>> = Lazy::new(|| Mutex::new(1));

fn next_snapshot_id() -> u64 {
    let mut next = NEXT_SNAPSHOT_ID
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let id = *next;
    *next += 1;
    id
}

/// What to do when one clipboard format cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFailurePolicy {
    /// Leave the format out of the snapshot.
    Skip,
    /// Re-read the whole clipboard through the retry policy.
    Retry,
    /// Abort the capture.
    Fatal,
}

pub fn classify_format_error(err: &FormatError) -> FormatFailurePolicy {
    match err {
        FormatError::Unsupported | FormatError::OutOfMemory | FormatError::Marshalling(_) => {
            FormatFailurePolicy::Skip
        }
        FormatError::Busy => FormatFailurePolicy::Retry,
        FormatError::ClipboardLost => FormatFailurePolicy::Fatal,
    }
}

/// The clipboard contents at one point in time, across every format that
/// could be read.
///
/// Snapshots never change after construction. Clones own their payloads, so
/// a clone kept in the history is unaffected by whatever happens to the
/// original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    id: u64,
    timestamp: DateTime<Utc>,
    formats: Vec<ClipboardFormat>,
}

impl ClipboardSnapshot {
    /// Build a snapshot with a fresh id. Later duplicates of a format name
    /// are dropped.
    pub fn from_formats(formats: Vec<ClipboardFormat>) -> Self {
        Self::from_parts(Utc::now(), formats)
    }

    pub(crate) fn from_parts(timestamp: DateTime<Utc>, formats: Vec<ClipboardFormat>) -> Self {
        let mut unique: Vec<ClipboardFormat> = Vec::with_capacity(formats.len());
        for format in formats {
            if !unique.iter().any(|f| f.name == format.name) {
                unique.push(format);
            }
        }
        Self {
            id: next_snapshot_id(),
            timestamp,
            formats: unique,
        }
    }

    /// Read every format currently on `source`.
    ///
    /// Formats that fail to read are handled per [`classify_format_error`];
    /// a capture that keeps no format at all is valid and means "empty".
    pub fn capture(
        source: &dyn ClipboardBackend,
        retry: &RetryPolicy,
    ) -> Result<Self, ClipboardError> {
        let formats = retry.run(|| collect_formats(source.read_formats()?))?;
        let snapshot = Self::from_formats(formats);
        tracing::debug!(
            id = snapshot.id,
            formats = snapshot.formats.len(),
            "captured clipboard contents"
        );
        Ok(snapshot)
    }

    /// Put every stored format back on `target` in one write.
    pub fn restore(
        &self,
        target: &dyn ClipboardBackend,
        retry: &RetryPolicy,
    ) -> Result<(), ClipboardError> {
        retry.run(|| target.write_formats(&self.formats))?;
        tracing::debug!(id = self.id, "restored clipboard contents");
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn formats(&self) -> &[ClipboardFormat] {
        &self.formats
    }

    pub fn format(&self, name: &str) -> Option<&ClipboardFormat> {
        self.formats.iter().find(|f| f.name == name)
    }

    pub fn format_names(&self) -> Vec<&str> {
        self.formats.iter().map(|f| f.name.as_str()).collect()
    }

    /// True when no format carries any data.
    pub fn is_empty(&self) -> bool {
        self.formats.iter().all(ClipboardFormat::is_empty)
    }

    pub fn preview(&self) -> String {
        preview::describe(&self.formats)
    }

    pub fn icon_category(&self) -> IconCategory {
        preview::icon_category(&self.formats)
    }
}

fn collect_formats(raw: Vec<RawFormat>) -> Result<Vec<ClipboardFormat>, ClipboardError> {
    let mut kept = Vec::with_capacity(raw.len());
    for RawFormat { name, payload } in raw {
        let err = match payload {
            Ok(data) => {
                kept.push(ClipboardFormat::new(name, data));
                continue;
            }
            Err(err) => err,
        };
        match classify_format_error(&err) {
            FormatFailurePolicy::Skip => {
                tracing::info!(format = %name, %err, "skipping unreadable clipboard format");
            }
            FormatFailurePolicy::Retry => {
                tracing::debug!(format = %name, %err, "clipboard format busy");
                return Err(ClipboardError::Busy { attempts: 1 });
            }
            FormatFailurePolicy::Fatal => {
                return Err(ClipboardError::Unavailable(format!(
                    "reading format '{name}': {err}"
                )));
            }
        }
    }
    Ok(kept)
}
