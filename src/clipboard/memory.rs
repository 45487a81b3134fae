use super::{check_written, ClipboardBackend, ClipboardFormat, RawFormat};
use crate::error::{ClipboardError, FormatError};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome forced onto the next read or write of a [`MemoryClipboard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Pass,
    Busy,
    Unavailable,
    /// The clipboard opens and is emptied, but no format can be set.
    /// Only meaningful for writes.
    RejectFormats,
}

#[derive(Default)]
struct MemoryState {
    formats: Vec<ClipboardFormat>,
    failing: Vec<(String, FormatError)>,
    read_script: VecDeque<Scripted>,
    write_script: VecDeque<Scripted>,
    reads: usize,
    writes: usize,
}

/// In-process clipboard. Reads and writes can be scripted to fail so the
/// retry and cleanup paths can be driven deterministically.
#[derive(Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formats(formats: Vec<ClipboardFormat>) -> Self {
        let clipboard = Self::new();
        clipboard.set_formats(formats);
        clipboard
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the contents, as another application copying would.
    pub fn set_formats(&self, formats: Vec<ClipboardFormat>) {
        let mut state = self.state();
        state.formats = formats;
        state.failing.clear();
    }

    pub fn set_text(&self, text: &str) {
        self.set_formats(vec![ClipboardFormat::unicode_text(text)]);
    }

    pub fn formats(&self) -> Vec<ClipboardFormat> {
        self.state().formats.clone()
    }

    /// Advertise a format whose data cannot be read.
    pub fn advertise_failing(&self, name: &str, error: FormatError) {
        self.state().failing.push((name.to_string(), error));
    }

    pub fn script_reads(&self, steps: impl IntoIterator<Item = Scripted>) {
        self.state().read_script.extend(steps);
    }

    pub fn script_writes(&self, steps: impl IntoIterator<Item = Scripted>) {
        self.state().write_script.extend(steps);
    }

    /// Number of read attempts, failed ones included.
    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    /// Number of write attempts, failed ones included.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

fn scripted_error(step: Option<Scripted>) -> Option<ClipboardError> {
    match step {
        Some(Scripted::Busy) => Some(ClipboardError::Busy { attempts: 1 }),
        Some(Scripted::Unavailable) => {
            Some(ClipboardError::Unavailable("scripted failure".into()))
        }
        Some(Scripted::Pass | Scripted::RejectFormats) | None => None,
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_formats(&self) -> Result<Vec<RawFormat>, ClipboardError> {
        let mut state = self.state();
        state.reads += 1;
        let step = state.read_script.pop_front();
        if let Some(err) = scripted_error(step) {
            return Err(err);
        }
        let mut raw: Vec<RawFormat> = state
            .formats
            .iter()
            .map(|f| RawFormat {
                name: f.name.clone(),
                payload: Ok(f.data.clone()),
            })
            .collect();
        raw.extend(state.failing.iter().map(|(name, err)| RawFormat {
            name: name.clone(),
            payload: Err(err.clone()),
        }));
        Ok(raw)
    }

    fn write_formats(&self, formats: &[ClipboardFormat]) -> Result<(), ClipboardError> {
        let mut state = self.state();
        state.writes += 1;
        let step = state.write_script.pop_front();
        if let Some(err) = scripted_error(step) {
            return Err(err);
        }
        if step == Some(Scripted::RejectFormats) {
            state.formats.clear();
            state.failing.clear();
            let names: Vec<String> = formats.iter().map(|f| f.name.clone()).collect();
            return check_written(&names);
        }
        state.formats = formats.to_vec();
        state.failing.clear();
        Ok(())
    }
}
