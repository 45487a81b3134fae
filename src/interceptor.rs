//! Classification and de-duplication of the window messages that drive the
//! clipboard manager.
//!
//! Everything here runs on the thread that owns the clipboard window. The
//! window procedure can be re-entered on that thread while a message is
//! still being handled, so state lives in `Cell`s and is never locked. Real
//! work is handed to worker threads and guarded by [`ClipboardInUse`].

use crate::hotkey::HotKey;
use crate::manager::ClipboardManager;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const WM_DRAWCLIPBOARD: u32 = 0x0308;
pub const WM_CHANGECBCHAIN: u32 = 0x030D;
pub const WM_HOTKEY: u32 = 0x0312;

/// Two identical messages closer together than this are one event.
pub const DUPLICATE_WINDOW: Duration = Duration::from_millis(500);

const IN_USE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub hwnd: isize,
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
    pub received: Instant,
}

impl WindowMessage {
    pub fn new(hwnd: isize, msg: u32, wparam: usize, lparam: isize) -> Self {
        Self::at(hwnd, msg, wparam, lparam, Instant::now())
    }

    pub fn at(hwnd: isize, msg: u32, wparam: usize, lparam: isize, received: Instant) -> Self {
        Self {
            hwnd,
            msg,
            wparam,
            lparam,
            received,
        }
    }

    /// Same window, code and parameters, received within [`DUPLICATE_WINDOW`]
    /// of `previous`.
    pub fn is_duplicate_of(&self, previous: &WindowMessage) -> bool {
        self.hwnd == previous.hwnd
            && self.msg == previous.msg
            && self.wparam == previous.wparam
            && self.lparam == previous.lparam
            && self.received.saturating_duration_since(previous.received) < DUPLICATE_WINDOW
    }
}

/// Passes clipboard chain messages on to the next viewer.
pub trait ViewerChain {
    fn forward(&self, next_viewer: isize, message: &WindowMessage);
}

/// Process wide "clipboard in use" flag.
///
/// Set while a hot key or clipboard change is being processed. A message
/// that arrives while it is set is dropped, not queued.
#[derive(Debug, Clone, Default)]
pub struct ClipboardInUse(Arc<AtomicBool>);

impl ClipboardInUse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag, or `None` if it already was.
    pub fn try_acquire(&self) -> Option<InUseGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InUseGuard(Arc::clone(&self.0)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Block until the flag is clear or `timeout` passes. Returns whether
    /// the flag cleared.
    pub fn wait_until_clear(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_set() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IN_USE_POLL_INTERVAL);
        }
        true
    }
}

/// Clears the flag when dropped.
#[derive(Debug)]
pub struct InUseGuard(Arc<AtomicBool>);

impl Drop for InUseGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum MessageOutcome {
    /// Repeat of the previous message of the same kind.
    Duplicate,
    /// Dropped because the clipboard is in use by this process.
    Busy,
    /// Clipboard change seen before startup completed.
    Ignored,
    Dispatched(JoinHandle<()>),
    /// The tracked next viewer was replaced.
    ChainUpdated,
    /// Passed on to the next viewer without local processing.
    Forwarded,
    /// Not a message this interceptor handles.
    Unhandled,
}

pub struct MessageInterceptor {
    manager: Arc<ClipboardManager>,
    chain: Box<dyn ViewerChain>,
    in_use: ClipboardInUse,
    last_hot_key: Cell<Option<WindowMessage>>,
    last_draw: Cell<Option<WindowMessage>>,
    last_chain_change: Cell<Option<WindowMessage>>,
    next_viewer: Cell<isize>,
    started: Cell<bool>,
}

impl MessageInterceptor {
    pub fn new(manager: Arc<ClipboardManager>, chain: Box<dyn ViewerChain>) -> Self {
        Self::with_flag(manager, chain, ClipboardInUse::new())
    }

    pub fn with_flag(
        manager: Arc<ClipboardManager>,
        chain: Box<dyn ViewerChain>,
        in_use: ClipboardInUse,
    ) -> Self {
        Self {
            manager,
            chain,
            in_use,
            last_hot_key: Cell::new(None),
            last_draw: Cell::new(None),
            last_chain_change: Cell::new(None),
            next_viewer: Cell::new(0),
            started: Cell::new(false),
        }
    }

    pub fn in_use(&self) -> &ClipboardInUse {
        &self.in_use
    }

    pub fn next_viewer(&self) -> isize {
        self.next_viewer.get()
    }

    pub fn set_next_viewer(&self, hwnd: isize) {
        self.next_viewer.set(hwnd);
    }

    /// Handle one window message. Returns immediately; any clipboard work
    /// runs on the worker in [`MessageOutcome::Dispatched`].
    pub fn handle(&self, message: WindowMessage) -> MessageOutcome {
        let first = !self.started.replace(true);
        match message.msg {
            WM_HOTKEY => self.on_hot_key(message),
            WM_DRAWCLIPBOARD => {
                let outcome = self.on_clipboard_changed(message, first);
                self.forward(&message);
                outcome
            }
            WM_CHANGECBCHAIN => self.on_chain_changed(message),
            _ => MessageOutcome::Unhandled,
        }
    }

    fn repeats(last: &Cell<Option<WindowMessage>>, message: &WindowMessage) -> bool {
        last.replace(Some(*message))
            .is_some_and(|previous| message.is_duplicate_of(&previous))
    }

    fn on_hot_key(&self, message: WindowMessage) -> MessageOutcome {
        let observed = HotKey::from_lparam(message.lparam);
        if Self::repeats(&self.last_hot_key, &message) {
            tracing::debug!(hot_key = %observed, "discarding duplicate hot key message");
            return MessageOutcome::Duplicate;
        }
        let Some(guard) = self.in_use.try_acquire() else {
            tracing::warn!(hot_key = %observed, "clipboard in use; dropping hot key");
            return MessageOutcome::Busy;
        };
        self.dispatch("hot-key", guard, move |manager| {
            manager.wait_for_modifier_release();
            manager.process_hot_key(&observed)
        })
    }

    fn on_clipboard_changed(&self, message: WindowMessage, first: bool) -> MessageOutcome {
        if Self::repeats(&self.last_draw, &message) {
            tracing::debug!("discarding duplicate clipboard change message");
            return MessageOutcome::Duplicate;
        }
        if first {
            tracing::debug!("ignoring clipboard change sent while joining the viewer chain");
            return MessageOutcome::Ignored;
        }
        let Some(guard) = self.in_use.try_acquire() else {
            tracing::debug!("clipboard changed by this process; not storing");
            return MessageOutcome::Busy;
        };
        self.dispatch("clipboard-changed", guard, |manager| {
            manager.store_clipboard_contents()
        })
    }

    fn on_chain_changed(&self, message: WindowMessage) -> MessageOutcome {
        if Self::repeats(&self.last_chain_change, &message) {
            tracing::debug!("discarding duplicate clipboard chain message");
            return MessageOutcome::Duplicate;
        }
        let removed = message.wparam as isize;
        if removed == self.next_viewer.get() {
            tracing::debug!(removed, next = message.lparam, "clipboard viewer chain changed");
            self.next_viewer.set(message.lparam);
            MessageOutcome::ChainUpdated
        } else {
            self.forward(&message);
            MessageOutcome::Forwarded
        }
    }

    fn forward(&self, message: &WindowMessage) {
        let next = self.next_viewer.get();
        if next != 0 {
            self.chain.forward(next, message);
        }
    }

    fn dispatch<F>(&self, name: &str, guard: InUseGuard, job: F) -> MessageOutcome
    where
        F: FnOnce(&ClipboardManager) -> anyhow::Result<()> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        let spawned = thread::Builder::new()
            .name(format!("clipboard-{name}"))
            .spawn(move || {
                let _guard = guard;
                match panic::catch_unwind(AssertUnwindSafe(|| job(&manager))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::error!(error = %format!("{err:#}"), "clipboard operation failed"),
                    Err(_) => tracing::error!("clipboard operation panicked"),
                }
            });
        match spawned {
            Ok(handle) => MessageOutcome::Dispatched(handle),
            Err(err) => {
                tracing::error!(%err, "unable to start clipboard worker");
                MessageOutcome::Busy
            }
        }
    }
}
