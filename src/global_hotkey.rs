use crate::error::HotKeyError;
use crate::hotkey::HotKey;
use log::{error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// `MOD_NOREPEAT`: suppress auto-repeat while the combination is held.
pub const MOD_NOREPEAT: u32 = 0x4000;

/// OS side of global hot keys: id allocation plus bind/unbind.
pub trait HotKeyBackend: Send {
    /// Allocate a process-unique id keyed by `name`. `None` on failure.
    fn allocate_id(&mut self, name: &str) -> Option<u16>;
    fn release_id(&mut self, id: u16);
    fn register(&mut self, id: u16, modifiers: u32, key: u32) -> anyhow::Result<()>;
    fn unregister(&mut self, id: u16) -> anyhow::Result<()>;
    fn supports_no_repeat(&self) -> bool;
}

/// Tracks the active hot key bindings and keeps them registered with the OS.
pub struct HotKeyRegistrar {
    backend: Box<dyn HotKeyBackend>,
    hot_keys: Vec<HotKey>,
}

impl HotKeyRegistrar {
    pub fn new(backend: Box<dyn HotKeyBackend>) -> Self {
        Self {
            backend,
            hot_keys: Vec::new(),
        }
    }

    pub fn hot_keys(&self) -> &[HotKey] {
        &self.hot_keys
    }

    /// Register `hot_key` globally.
    ///
    /// On failure nothing stays allocated; callers report the error and
    /// carry on with their remaining bindings.
    pub fn register(&mut self, mut hot_key: HotKey) -> Result<(), HotKeyError> {
        if self.hot_keys.iter().any(|hk| hk.matches(&hot_key)) {
            warn!("Hot key '{}' is already bound.", hot_key);
            return Err(HotKeyError::AlreadyBound(hot_key.to_string()));
        }

        let Some(id) = self.backend.allocate_id(&hot_key.atom_name()) else {
            error!("Unable to allocate an id for hot key '{}'.", hot_key);
            return Err(HotKeyError::IdAllocation(hot_key.to_string()));
        };

        let mut modifiers = hot_key.modifiers.bits();
        if self.backend.supports_no_repeat() {
            modifiers |= MOD_NOREPEAT;
        }

        if let Err(err) = self.backend.register(id, modifiers, hot_key.key) {
            error!("Failed to register hot key '{}': {err}", hot_key);
            self.backend.release_id(id);
            return Err(HotKeyError::Registration {
                hot_key: hot_key.to_string(),
                reason: err.to_string(),
            });
        }

        info!(
            "Registered hot key '{}' ({} for clipboard {}) with ID {}.",
            hot_key, hot_key.operation, hot_key.clipboard_id, id
        );
        hot_key.registration_id = Some(id);
        self.hot_keys.push(hot_key);
        Ok(())
    }

    fn release(&mut self, hot_key: &mut HotKey) {
        let Some(id) = hot_key.registration_id.take() else {
            return;
        };
        if id == 0 {
            return;
        }
        match self.backend.unregister(id) {
            Ok(()) => info!("Unregistered hot key '{}'.", hot_key),
            Err(err) => warn!("Failed to unregister hot key '{}': {err}", hot_key),
        }
        self.backend.release_id(id);
    }

    /// Unregister the binding for the same slot and operation as `hot_key`.
    /// Unknown or already released bindings are ignored.
    pub fn unregister(&mut self, hot_key: &HotKey) {
        if let Some(pos) = self.hot_keys.iter().position(|hk| hk.is_same_binding(hot_key)) {
            let mut removed = self.hot_keys.remove(pos);
            self.release(&mut removed);
        }
    }

    /// Unregister every binding of one clipboard slot.
    pub fn unregister_slot(&mut self, clipboard_id: i32) -> Vec<HotKey> {
        let (mut removed, kept): (Vec<HotKey>, Vec<HotKey>) = std::mem::take(&mut self.hot_keys)
            .into_iter()
            .partition(|hk| hk.clipboard_id == clipboard_id);
        self.hot_keys = kept;
        for hot_key in &mut removed {
            self.release(hot_key);
        }
        removed
    }

    pub fn unregister_all(&mut self) {
        let mut all = std::mem::take(&mut self.hot_keys);
        for hot_key in &mut all {
            self.release(hot_key);
        }
    }

    /// Find the binding for an observed combination. Exactly one binding
    /// must match.
    pub fn find(&self, observed: &HotKey) -> Result<HotKey, HotKeyError> {
        let mut matches = self.hot_keys.iter().filter(|hk| hk.matches(observed));
        match (matches.next(), matches.count()) {
            (Some(hot_key), 0) => Ok(hot_key.clone()),
            (None, _) => Err(HotKeyError::NoMatch(observed.to_string())),
            (Some(_), extra) => Err(HotKeyError::Ambiguous {
                hot_key: observed.to_string(),
                matches: extra + 1,
            }),
        }
    }
}

impl Drop for HotKeyRegistrar {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

#[cfg(windows)]
pub use platform::WindowsHotKeyBackend;

#[cfg(windows)]
mod platform {
    use super::HotKeyBackend;
    use anyhow::Context;
    use windows::core::HSTRING;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::System::DataExchange::{GlobalAddAtomW, GlobalDeleteAtom};
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
    };

    /// Hot keys bound to the hidden clipboard window through global atoms.
    pub struct WindowsHotKeyBackend {
        hwnd: isize,
    }

    impl WindowsHotKeyBackend {
        /// `hwnd` must belong to the thread that will register the keys.
        pub fn new(hwnd: HWND) -> Self {
            Self {
                hwnd: hwnd.0 as isize,
            }
        }

        fn hwnd(&self) -> HWND {
            HWND(self.hwnd as *mut core::ffi::c_void)
        }
    }

    impl HotKeyBackend for WindowsHotKeyBackend {
        fn allocate_id(&mut self, name: &str) -> Option<u16> {
            let atom = unsafe { GlobalAddAtomW(&HSTRING::from(name)) };
            (atom != 0).then_some(atom)
        }

        fn release_id(&mut self, id: u16) {
            unsafe {
                GlobalDeleteAtom(id);
            }
        }

        fn register(&mut self, id: u16, modifiers: u32, key: u32) -> anyhow::Result<()> {
            unsafe { RegisterHotKey(self.hwnd(), i32::from(id), HOT_KEY_MODIFIERS(modifiers), key) }
                .context("RegisterHotKey")
        }

        fn unregister(&mut self, id: u16) -> anyhow::Result<()> {
            unsafe { UnregisterHotKey(self.hwnd(), i32::from(id)) }.context("UnregisterHotKey")
        }

        fn supports_no_repeat(&self) -> bool {
            // MOD_NOREPEAT is honoured from Windows 7 on and ignored before.
            true
        }
    }
}

#[derive(Default)]
struct MockHotKeyState {
    next_id: AtomicUsize,
    registered: Mutex<Vec<(u16, u32, u32)>>,
    allocated: Mutex<Vec<u16>>,
    refuse: Mutex<Vec<u32>>,
    refuse_ids: Mutex<bool>,
}

/// In-memory backend that records registrations.
#[derive(Clone, Default)]
pub struct MockHotKeyBackend {
    state: Arc<MockHotKeyState>,
    no_repeat: bool,
}

impl MockHotKeyBackend {
    pub fn new() -> (Self, MockHotKeyHandle) {
        let backend = Self::default();
        let handle = MockHotKeyHandle {
            state: Arc::clone(&backend.state),
        };
        (backend, handle)
    }

    pub fn with_no_repeat(mut self) -> Self {
        self.no_repeat = true;
        self
    }
}

impl HotKeyBackend for MockHotKeyBackend {
    fn allocate_id(&mut self, _name: &str) -> Option<u16> {
        if *self.state.refuse_ids.lock().unwrap_or_else(PoisonError::into_inner) {
            return None;
        }
        let id = 0xC000 + self.state.next_id.fetch_add(1, Ordering::SeqCst) as u16;
        self.state
            .allocated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        Some(id)
    }

    fn release_id(&mut self, id: u16) {
        self.state
            .allocated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|a| *a != id);
    }

    fn register(&mut self, id: u16, modifiers: u32, key: u32) -> anyhow::Result<()> {
        let refused = self
            .state
            .refuse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key);
        if refused {
            anyhow::bail!("hot key already registered by another application");
        }
        self.state
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, modifiers, key));
        Ok(())
    }

    fn unregister(&mut self, id: u16) -> anyhow::Result<()> {
        self.state
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(rid, _, _)| *rid != id);
        Ok(())
    }

    fn supports_no_repeat(&self) -> bool {
        self.no_repeat
    }
}

/// Inspects and steers a [`MockHotKeyBackend`] after it has been moved into
/// a registrar.
pub struct MockHotKeyHandle {
    state: Arc<MockHotKeyState>,
}

impl MockHotKeyHandle {
    /// `(id, modifiers, key)` for every live OS registration.
    pub fn registered(&self) -> Vec<(u16, u32, u32)> {
        self.state
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ids allocated and not yet released.
    pub fn allocated(&self) -> Vec<u16> {
        self.state
            .allocated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make OS registration of `key` fail, as if another application owned it.
    pub fn refuse_key(&self, key: u32) {
        self.state
            .refuse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);
    }

    pub fn refuse_id_allocation(&self, refuse: bool) {
        *self
            .state
            .refuse_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = refuse;
    }
}
