//! Access to the OS clipboard as a set of named, opaque formats.

pub mod memory;
#[cfg(windows)]
pub mod win32;

use crate::error::{ClipboardError, FormatError};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Format names used for the well-known clipboard formats.
pub mod formats {
    pub const TEXT: &str = "Text";
    pub const UNICODE_TEXT: &str = "UnicodeText";
    pub const OEM_TEXT: &str = "OEMText";
    pub const HTML: &str = "HTML Format";
    pub const RTF: &str = "Rich Text Format";
    pub const BITMAP: &str = "Bitmap";
    pub const DIB: &str = "DeviceIndependentBitmap";
    pub const DIB_V5: &str = "DeviceIndependentBitmapV5";
    pub const PNG: &str = "PNG";
    pub const FILE_DROP: &str = "FileDrop";
    pub const WAVE_AUDIO: &str = "WaveAudio";
    pub const RIFF_AUDIO: &str = "RiffAudio";
    pub const LOCALE: &str = "Locale";
}

/// One clipboard format and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardFormat {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ClipboardFormat {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// `UnicodeText` payload: UTF-16LE with a terminating NUL, the layout
    /// Windows uses for `CF_UNICODETEXT`.
    pub fn unicode_text(text: &str) -> Self {
        let mut data = Vec::with_capacity((text.len() + 1) * 2);
        for unit in text.encode_utf16().chain(std::iter::once(0)) {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        Self::new(formats::UNICODE_TEXT, data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A format as read from the clipboard, before the capture policy decides
/// whether to keep it.
#[derive(Debug, Clone)]
pub struct RawFormat {
    pub name: String,
    pub payload: Result<Vec<u8>, FormatError>,
}

/// The OS clipboard, or something standing in for it.
pub trait ClipboardBackend: Send + Sync {
    /// Open the clipboard once and read every advertised format.
    ///
    /// Failing to open the clipboard is an error for the whole call; a
    /// single unreadable format is reported in its own [`RawFormat`].
    fn read_formats(&self) -> Result<Vec<RawFormat>, ClipboardError>;

    /// Replace the clipboard contents with `formats` inside a single
    /// open/empty/set/close bracket. An empty slice clears the clipboard.
    fn write_formats(&self, formats: &[ClipboardFormat]) -> Result<(), ClipboardError>;
}

/// Outcome of a write given the names of the formats that could not be
/// set. Any failure fails the write; formats already set stay on the
/// clipboard.
pub fn check_written(failed: &[String]) -> Result<(), ClipboardError> {
    if failed.is_empty() {
        Ok(())
    } else {
        Err(ClipboardError::Os(format!(
            "unable to write clipboard format(s): {}",
            failed.join(", ")
        )))
    }
}

/// Fixed-delay retry for transient clipboard contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Run `op`, retrying while it reports [`ClipboardError::Busy`].
    ///
    /// Other errors are returned immediately. When every attempt was busy the
    /// result is `Busy { attempts }` with the total number of attempts made.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, ClipboardError>,
    ) -> Result<T, ClipboardError> {
        let attempts = self.attempts();
        for attempt in 1..=attempts {
            match op() {
                Err(ClipboardError::Busy { .. }) if attempt < attempts => {
                    tracing::debug!(attempt, "clipboard busy; retrying in {:?}", self.delay);
                    thread::sleep(self.delay);
                }
                Err(ClipboardError::Busy { .. }) => break,
                other => return other,
            }
        }
        Err(ClipboardError::Busy { attempts })
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
