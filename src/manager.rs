use crate::clipboard::{ClipboardBackend, RetryPolicy};
use crate::error::{ClipboardError, HotKeyError, SlotError};
use crate::global_hotkey::{HotKeyBackend, HotKeyRegistrar};
use crate::history::{ClipboardHistory, DEFAULT_HISTORY_LIMIT};
use crate::hotkey::{HotKey, HotKeyOperation, ModifierKeys};
use crate::keyboard::KeyboardBackend;
use crate::notify::{Notification, NotificationSink};
use crate::settings::{ClipboardDefinition, ClipboardDefinitionStore};
use crate::slots::{ClipboardSlotRegistry, SYSTEM_CLIPBOARD_ID};
use crate::snapshot::ClipboardSnapshot;
use anyhow::Context;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

const VK_C: u32 = 0x43;
const VK_V: u32 = 0x56;
const VK_X: u32 = 0x58;

/// How long to wait between polls while modifier keys are still held.
pub const MODIFIER_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Pause after a simulated keystroke so the foreground application has
    /// time to update the clipboard. There is no completion signal to wait on.
    pub thread_delay: Duration,
    pub retry: RetryPolicy,
    pub history_capacity: usize,
    /// Send Ctrl+X for cut bindings instead of Ctrl+C.
    pub simulate_cut: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            thread_delay: Duration::from_millis(250),
            retry: RetryPolicy::default(),
            history_capacity: DEFAULT_HISTORY_LIMIT,
            simulate_cut: false,
        }
    }
}

/// Everything the manager talks to outside its own state.
pub struct ManagerBackends {
    pub clipboard: Arc<dyn ClipboardBackend>,
    pub keyboard: Arc<dyn KeyboardBackend>,
    pub hot_keys: Box<dyn HotKeyBackend>,
    pub notifier: Arc<dyn NotificationSink>,
    pub store: Arc<dyn ClipboardDefinitionStore>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts the preserved clipboard contents back when dropped, unless
/// [`RestoreOnExit::finish`] already did.
struct RestoreOnExit<'a> {
    manager: &'a ClipboardManager,
    preserved: Option<ClipboardSnapshot>,
    hot_key: &'a HotKey,
}

impl RestoreOnExit<'_> {
    fn finish(mut self) -> Result<(), ClipboardError> {
        match self.preserved.take() {
            Some(snapshot) => self.manager.restore(&snapshot),
            None => Ok(()),
        }
    }
}

impl Drop for RestoreOnExit<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.preserved.take() {
            if let Err(err) = self.manager.restore(&snapshot) {
                tracing::error!(
                    hot_key = %self.hot_key,
                    slot = self.hot_key.clipboard_id,
                    %err,
                    "failed to restore clipboard contents"
                );
            }
        }
    }
}

/// Owns the clipboard slots, the history and the hot key bindings, and runs
/// the cut, copy and paste protocols against the OS clipboard.
///
/// Each piece of state sits behind its own mutex and no two are ever held
/// at once. Only one hot key or clipboard change is processed at a time;
/// that is enforced by the message interceptor, not here.
pub struct ClipboardManager {
    config: ManagerConfig,
    clipboard: Arc<dyn ClipboardBackend>,
    keyboard: Arc<dyn KeyboardBackend>,
    notifier: Arc<dyn NotificationSink>,
    store: Arc<dyn ClipboardDefinitionStore>,
    registrar: Mutex<HotKeyRegistrar>,
    slots: Mutex<ClipboardSlotRegistry>,
    history: Mutex<ClipboardHistory>,
    available: Mutex<Vec<ClipboardDefinition>>,
}

impl ClipboardManager {
    /// Create the manager and register the hot keys of every definition.
    ///
    /// Definitions that fail are reported and skipped. On Windows this must
    /// run on the thread that owns the hot key window.
    pub fn new(
        config: ManagerConfig,
        backends: ManagerBackends,
        definitions: Vec<ClipboardDefinition>,
    ) -> Self {
        let manager = Self {
            config,
            clipboard: backends.clipboard,
            keyboard: backends.keyboard,
            notifier: backends.notifier,
            store: backends.store,
            registrar: Mutex::new(HotKeyRegistrar::new(backends.hot_keys)),
            slots: Mutex::new(ClipboardSlotRegistry::new()),
            history: Mutex::new(ClipboardHistory::new(config.history_capacity)),
            available: Mutex::new(Vec::new()),
        };
        for definition in definitions {
            if let Err(err) = manager.install(definition) {
                tracing::error!(error = %format!("{err:#}"), "skipping clipboard definition");
                manager
                    .notifier
                    .notify(Notification::error(format!("{err:#}")));
            }
        }
        manager
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn keyboard(&self) -> Arc<dyn KeyboardBackend> {
        Arc::clone(&self.keyboard)
    }

    /// Create the slot, then register its bindings. Registration failures
    /// are reported but leave the slot in place.
    fn install(&self, definition: ClipboardDefinition) -> anyhow::Result<()> {
        let hot_keys = definition
            .hot_keys()
            .with_context(|| format!("clipboard {}", definition.id))?;
        lock(&self.slots)
            .add(definition.id)
            .with_context(|| format!("adding clipboard {}", definition.id))?;
        self.register_hot_keys(hot_keys);
        lock(&self.available).push(definition);
        Ok(())
    }

    fn register_hot_keys(&self, hot_keys: Vec<HotKey>) {
        let mut registrar = lock(&self.registrar);
        for hot_key in hot_keys {
            let description = hot_key.to_string();
            if let Err(err) = registrar.register(hot_key) {
                let text = match err {
                    HotKeyError::Registration { .. } | HotKeyError::IdAllocation(_) => format!(
                        "Unable to register hot key combination {description}. Is it already in use by another application?"
                    ),
                    other => format!("Unable to register hot key combination {description}: {other}"),
                };
                self.notifier.notify(Notification::warning(text));
            }
        }
    }

    /// Define a new clipboard slot, persist it and bind its hot keys.
    pub fn add_clipboard(&self, definition: ClipboardDefinition) -> anyhow::Result<()> {
        let hot_keys = definition
            .hot_keys()
            .with_context(|| format!("clipboard {}", definition.id))?;
        lock(&self.slots).add(definition.id)?;
        if let Err(err) = self.store.add_definition(&definition) {
            let _ = lock(&self.slots).remove(definition.id);
            return Err(err.context(format!("saving clipboard {}", definition.id)));
        }
        self.register_hot_keys(hot_keys);
        tracing::info!(slot = definition.id, keys = %definition.description(), "added clipboard");
        lock(&self.available).push(definition);
        Ok(())
    }

    /// Unbind a slot's hot keys, drop its contents and persist the removal.
    pub fn remove_clipboard(&self, definition: &ClipboardDefinition) -> anyhow::Result<()> {
        if definition.id == SYSTEM_CLIPBOARD_ID {
            return Err(SlotError::Reserved.into());
        }
        lock(&self.slots).remove(definition.id)?;
        let removed = lock(&self.registrar).unregister_slot(definition.id);
        lock(&self.available).retain(|d| d.id != definition.id);
        self.store
            .remove_definition(definition.id)
            .with_context(|| format!("saving removal of clipboard {}", definition.id))?;
        tracing::info!(
            slot = definition.id,
            hot_keys = removed.len(),
            "removed clipboard"
        );
        Ok(())
    }

    fn capture(&self) -> Result<ClipboardSnapshot, ClipboardError> {
        ClipboardSnapshot::capture(self.clipboard.as_ref(), &self.config.retry)
    }

    fn restore(&self, snapshot: &ClipboardSnapshot) -> Result<(), ClipboardError> {
        snapshot.restore(self.clipboard.as_ref(), &self.config.retry)
    }

    fn record(&self, snapshot: &ClipboardSnapshot) {
        if lock(&self.history).push(snapshot.clone()) {
            tracing::debug!(id = snapshot.id(), "added clipboard history entry");
        }
    }

    /// Capture an external clipboard change into the system slot and the
    /// history.
    pub fn store_clipboard_contents(&self) -> anyhow::Result<()> {
        let snapshot = self.capture().context("reading the system clipboard")?;
        tracing::info!(id = snapshot.id(), preview = %snapshot.preview(), "clipboard changed");
        self.record(&snapshot);
        lock(&self.slots).set(SYSTEM_CLIPBOARD_ID, snapshot)?;
        Ok(())
    }

    /// Run the operation bound to an observed key combination.
    pub fn process_hot_key(&self, observed: &HotKey) -> anyhow::Result<()> {
        let hot_key = match lock(&self.registrar).find(observed) {
            Ok(hot_key) => hot_key,
            Err(err) => {
                tracing::error!(hot_key = %observed, %err, "hot key does not resolve to exactly one binding");
                return Err(err.into());
            }
        };

        tracing::info!(
            hot_key = %hot_key,
            operation = %hot_key.operation,
            slot = hot_key.clipboard_id,
            "processing hot key"
        );
        let result = match hot_key.operation {
            HotKeyOperation::Cut | HotKeyOperation::Copy => self.copy_to_slot(&hot_key),
            HotKeyOperation::Paste => self.paste_from_slot(&hot_key),
        };

        if let Err(err) = &result {
            tracing::error!(
                hot_key = %hot_key,
                operation = %hot_key.operation,
                slot = hot_key.clipboard_id,
                error = %format!("{err:#}"),
                "hot key operation failed"
            );
            let text = match err.downcast_ref::<ClipboardError>() {
                Some(ClipboardError::Busy { .. }) => {
                    "The clipboard is being used by another application. Please try again.".to_string()
                }
                _ => format!(
                    "Unable to {} using clipboard {}.",
                    hot_key.operation.to_string().to_lowercase(),
                    hot_key.clipboard_id
                ),
            };
            self.notifier.notify(Notification::error(text));
        }
        result
    }

    fn copy_to_slot(&self, hot_key: &HotKey) -> anyhow::Result<()> {
        let preserved = self
            .capture()
            .context("preserving clipboard contents")?;
        let guard = RestoreOnExit {
            manager: self,
            preserved: Some(preserved),
            hot_key,
        };

        let key = match hot_key.operation {
            HotKeyOperation::Cut if self.config.simulate_cut => VK_X,
            _ => VK_C,
        };
        self.keyboard
            .send_chord(ModifierKeys::CONTROL, key)
            .context("sending copy keystroke")?;
        thread::sleep(self.config.thread_delay);

        let snapshot = self.capture().context("reading copied contents")?;
        self.record(&snapshot);
        lock(&self.slots).set(hot_key.clipboard_id, snapshot)?;

        guard
            .finish()
            .context("restoring clipboard contents")?;
        Ok(())
    }

    fn paste_from_slot(&self, hot_key: &HotKey) -> anyhow::Result<()> {
        let stored = {
            let slots = lock(&self.slots);
            if !slots.contains(hot_key.clipboard_id) {
                return Err(SlotError::Unknown(hot_key.clipboard_id).into());
            }
            slots.get(hot_key.clipboard_id).cloned()
        };
        let Some(stored) = stored else {
            tracing::info!(slot = hot_key.clipboard_id, "clipboard is empty; nothing to paste");
            return Ok(());
        };

        let preserved = self
            .capture()
            .context("preserving clipboard contents")?;
        let guard = RestoreOnExit {
            manager: self,
            preserved: Some(preserved),
            hot_key,
        };

        self.restore(&stored)
            .context("placing clipboard contents")?;
        self.keyboard
            .send_chord(ModifierKeys::CONTROL, VK_V)
            .context("sending paste keystroke")?;
        thread::sleep(self.config.thread_delay);

        guard
            .finish()
            .context("restoring clipboard contents")?;
        Ok(())
    }

    /// Put a history entry on the system clipboard, or into a slot.
    pub fn place_historical_entry_on_clipboard(
        &self,
        clipboard_id: i32,
        entry_id: u64,
    ) -> anyhow::Result<()> {
        let entry = lock(&self.history)
            .get(entry_id)
            .cloned()
            .with_context(|| format!("history entry {entry_id} not found"))?;
        if clipboard_id == SYSTEM_CLIPBOARD_ID {
            self.restore(&entry)
                .context("placing history entry on the clipboard")?;
        } else {
            lock(&self.slots).set(clipboard_id, entry)?;
        }
        tracing::info!(slot = clipboard_id, entry = entry_id, "placed history entry");
        Ok(())
    }

    pub fn clear_clipboard_history(&self) {
        lock(&self.history).clear();
        tracing::info!("cleared clipboard history");
    }

    /// History entries, oldest first.
    pub fn history_entries(&self) -> Vec<ClipboardSnapshot> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn slot_snapshot(&self, clipboard_id: i32) -> Option<ClipboardSnapshot> {
        lock(&self.slots).get(clipboard_id).cloned()
    }

    pub fn slot_preview(&self, clipboard_id: i32) -> Option<String> {
        lock(&self.slots).get(clipboard_id).map(ClipboardSnapshot::preview)
    }

    pub fn available_clipboards(&self) -> Vec<ClipboardDefinition> {
        lock(&self.available).clone()
    }

    pub fn hot_keys(&self) -> Vec<HotKey> {
        lock(&self.registrar).hot_keys().to_vec()
    }

    pub fn set_history_capacity(&self, capacity: usize) {
        lock(&self.history).set_capacity(capacity);
    }

    /// Block until no modifier key is held, so simulated keystrokes are not
    /// combined with the keys the user is still pressing.
    pub fn wait_for_modifier_release(&self) {
        while self.keyboard.modifiers_down() {
            thread::sleep(MODIFIER_POLL_INTERVAL);
        }
    }

    /// Replace the history with the one stored at `path`.
    pub fn load_history(&self, path: &Path) -> anyhow::Result<()> {
        let mut history = lock(&self.history);
        let loaded = ClipboardHistory::load(path, history.capacity())
            .with_context(|| format!("loading {}", path.display()))?;
        tracing::info!(entries = loaded.len(), "loaded clipboard history");
        *history = loaded;
        Ok(())
    }

    pub fn save_history(&self, path: &Path) -> anyhow::Result<()> {
        lock(&self.history)
            .save(path)
            .with_context(|| format!("saving {}", path.display()))
    }

    /// Unregister every hot key. Safe to call more than once.
    pub fn dispose(&self) {
        lock(&self.registrar).unregister_all();
    }
}

impl Drop for ClipboardManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
