use crate::hotkey::ModifierKeys;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Simulated keyboard input to the foreground application.
pub trait KeyboardBackend: Send + Sync {
    /// Press `modifiers` and `key` together, then release them.
    fn send_chord(&self, modifiers: ModifierKeys, key: u32) -> anyhow::Result<()>;

    /// True while any modifier key is physically held down.
    fn modifiers_down(&self) -> bool;
}

#[cfg(windows)]
pub use platform::SendInputKeyboard;

#[cfg(windows)]
mod platform {
    use super::KeyboardBackend;
    use crate::hotkey::ModifierKeys;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT,
        KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP, VIRTUAL_KEY,
    };

    const VK_SHIFT: u16 = 0x10;
    const VK_CONTROL: u16 = 0x11;
    const VK_MENU: u16 = 0x12;
    const VK_LWIN: u16 = 0x5B;
    const VK_RWIN: u16 = 0x5C;

    /// `SendInput` keystrokes and `GetAsyncKeyState` polling.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SendInputKeyboard;

    fn key_input(vk: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn modifier_keys(modifiers: ModifierKeys) -> Vec<u16> {
        let mut keys = Vec::new();
        if modifiers.contains(ModifierKeys::CONTROL) {
            keys.push(VK_CONTROL);
        }
        if modifiers.contains(ModifierKeys::ALT) {
            keys.push(VK_MENU);
        }
        if modifiers.contains(ModifierKeys::SHIFT) {
            keys.push(VK_SHIFT);
        }
        if modifiers.contains(ModifierKeys::WINDOWS) {
            keys.push(VK_LWIN);
        }
        keys
    }

    impl KeyboardBackend for SendInputKeyboard {
        fn send_chord(&self, modifiers: ModifierKeys, key: u32) -> anyhow::Result<()> {
            let mut vks = modifier_keys(modifiers);
            vks.push(u16::try_from(key)?);

            // key down in order, key up in reverse order
            let mut inputs: Vec<INPUT> = vks
                .iter()
                .map(|vk| key_input(*vk, KEYBD_EVENT_FLAGS(0)))
                .collect();
            inputs.extend(vks.iter().rev().map(|vk| key_input(*vk, KEYEVENTF_KEYUP)));

            let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
            if sent as usize != inputs.len() {
                anyhow::bail!("SendInput sent {sent} of {} events", inputs.len());
            }
            Ok(())
        }

        fn modifiers_down(&self) -> bool {
            [VK_SHIFT, VK_CONTROL, VK_MENU, VK_LWIN, VK_RWIN]
                .iter()
                .any(|vk| (unsafe { GetAsyncKeyState(i32::from(*vk)) } as u16) & 0x8000 != 0)
        }
    }
}

type ChordCallback = Box<dyn Fn(ModifierKeys, u32) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct RecordingState {
    chords: Vec<(ModifierKeys, u32)>,
    held_polls: VecDeque<bool>,
    polls: usize,
}

/// Keyboard that records chords instead of sending them.
///
/// An optional callback runs for every chord, standing in for the
/// foreground application reacting to the keystroke.
#[derive(Clone, Default)]
pub struct RecordingKeyboard {
    state: Arc<Mutex<RecordingState>>,
    on_send: Option<Arc<ChordCallback>>,
}

impl RecordingKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_send<F>(mut self, callback: F) -> Self
    where
        F: Fn(ModifierKeys, u32) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_send = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Answers for the next `modifiers_down` polls; afterwards no modifier
    /// is reported as held.
    pub fn hold_modifiers_for(&self, polls: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.held_polls.extend(std::iter::repeat(true).take(polls));
    }

    pub fn chords(&self) -> Vec<(ModifierKeys, u32)> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .chords
            .clone()
    }

    pub fn poll_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .polls
    }
}

impl KeyboardBackend for RecordingKeyboard {
    fn send_chord(&self, modifiers: ModifierKeys, key: u32) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .chords
            .push((modifiers, key));
        match &self.on_send {
            Some(callback) => callback(modifiers, key),
            None => Ok(()),
        }
    }

    fn modifiers_down(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.polls += 1;
        state.held_polls.pop_front().unwrap_or(false)
    }
}
