use thiserror::Error;

/// Failure talking to the OS clipboard as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// Another process holds the clipboard open. Retryable.
    #[error("clipboard is busy (gave up after {attempts} attempt(s))")]
    Busy { attempts: u32 },
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard OS call failed: {0}")]
    Os(String),
}

impl ClipboardError {
    pub fn is_busy(&self) -> bool {
        matches!(self, ClipboardError::Busy { .. })
    }
}

/// Failure reading a single clipboard format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("format is not stored in global memory")]
    Unsupported,
    #[error("out of memory while copying format data")]
    OutOfMemory,
    #[error("format data could not be marshalled: {0}")]
    Marshalling(String),
    #[error("clipboard busy while reading format")]
    Busy,
    #[error("clipboard was closed while reading")]
    ClipboardLost,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotKeyError {
    #[error("invalid hot key sequence '{0}'")]
    InvalidSequence(String),
    #[error("hot key {0} is already bound")]
    AlreadyBound(String),
    #[error("unable to allocate an id for hot key {0}")]
    IdAllocation(String),
    #[error("unable to register hot key {hot_key}: {reason}")]
    Registration { hot_key: String, reason: String },
    #[error("no bound hot key matches {0}")]
    NoMatch(String),
    #[error("{matches} bound hot keys match {hot_key}")]
    Ambiguous { hot_key: String, matches: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("clipboard {0} already exists")]
    Duplicate(i32),
    #[error("clipboard {0} does not exist")]
    Unknown(i32),
    #[error("the system clipboard cannot be added or removed")]
    Reserved,
    #[error("clipboard id {0} is invalid; ids must be positive")]
    InvalidId(i32),
}
