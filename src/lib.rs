pub mod clipboard;
#[cfg(windows)]
pub mod clipboard_window;
pub mod error;
pub mod global_hotkey;
pub mod history;
pub mod hotkey;
pub mod interceptor;
pub mod keyboard;
pub mod logging;
pub mod manager;
pub mod notify;
pub mod preview;
pub mod settings;
pub mod slots;
pub mod snapshot;
