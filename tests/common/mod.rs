#![allow(dead_code)]

use multi_clipboards::clipboard::memory::MemoryClipboard;
use multi_clipboards::clipboard::RetryPolicy;
use multi_clipboards::global_hotkey::{MockHotKeyBackend, MockHotKeyHandle};
use multi_clipboards::keyboard::RecordingKeyboard;
use multi_clipboards::manager::{ClipboardManager, ManagerBackends, ManagerConfig};
use multi_clipboards::notify::NotificationQueue;
use multi_clipboards::settings::ClipboardDefinition;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Harness {
    pub manager: Arc<ClipboardManager>,
    pub clipboard: Arc<MemoryClipboard>,
    pub keyboard: RecordingKeyboard,
    pub hot_keys: MockHotKeyHandle,
    pub notifications: Arc<NotificationQueue>,
    pub store: Arc<Mutex<Vec<ClipboardDefinition>>>,
}

pub fn fast_config() -> ManagerConfig {
    ManagerConfig {
        thread_delay: Duration::ZERO,
        retry: RetryPolicy::new(2, Duration::ZERO),
        history_capacity: 20,
        simulate_cut: false,
    }
}

pub fn ctrl_alt(id: i32) -> ClipboardDefinition {
    ClipboardDefinition::new(id, "Ctrl+Alt", "X", "C", "V")
}

/// Build a manager over in-memory backends. `keyboard` is usually a
/// `RecordingKeyboard` whose callback plays the foreground application.
pub fn harness_with(
    config: ManagerConfig,
    clipboard: Arc<MemoryClipboard>,
    keyboard: RecordingKeyboard,
    definitions: Vec<ClipboardDefinition>,
) -> Harness {
    let (backend, hot_keys) = MockHotKeyBackend::new();
    harness_with_backend(config, clipboard, keyboard, definitions, backend, hot_keys)
}

pub fn harness_with_backend(
    config: ManagerConfig,
    clipboard: Arc<MemoryClipboard>,
    keyboard: RecordingKeyboard,
    definitions: Vec<ClipboardDefinition>,
    backend: MockHotKeyBackend,
    hot_keys: MockHotKeyHandle,
) -> Harness {
    let notifications = Arc::new(NotificationQueue::default());
    let store = Arc::new(Mutex::new(definitions.clone()));
    let backends = ManagerBackends {
        clipboard: clipboard.clone(),
        keyboard: Arc::new(keyboard.clone()),
        hot_keys: Box::new(backend),
        notifier: notifications.clone(),
        store: store.clone(),
    };
    let manager = Arc::new(ClipboardManager::new(config, backends, definitions));
    Harness {
        manager,
        clipboard,
        keyboard,
        hot_keys,
        notifications,
        store,
    }
}

pub fn harness(definitions: Vec<ClipboardDefinition>) -> Harness {
    harness_with(
        fast_config(),
        Arc::new(MemoryClipboard::new()),
        RecordingKeyboard::new(),
        definitions,
    )
}

/// A keyboard that copies `text` onto `clipboard` whenever Ctrl+C or Ctrl+X
/// is sent, like a text editor with a selection would.
pub fn copying_keyboard(clipboard: &Arc<MemoryClipboard>, text: &'static str) -> RecordingKeyboard {
    let target = Arc::clone(clipboard);
    RecordingKeyboard::new().on_send(move |_mods, key| {
        if key == 0x43 || key == 0x58 {
            target.set_text(text);
        }
        Ok(())
    })
}

pub fn text_of(clipboard: &MemoryClipboard) -> Option<String> {
    clipboard
        .formats()
        .iter()
        .find(|f| f.name == "UnicodeText")
        .map(|f| multi_clipboards::preview::decode_unicode_text(&f.data))
}
