use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::BitOr;

/// Modifier bitmask using the same bit values as the Win32 `MOD_*` flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierKeys(u32);

impl ModifierKeys {
    pub const NONE: Self = Self(0);
    pub const ALT: Self = Self(0x0001);
    pub const CONTROL: Self = Self(0x0002);
    pub const SHIFT: Self = Self(0x0004);
    pub const WINDOWS: Self = Self(0x0008);

    const MASK: u32 = 0x000F;

    /// Build from a raw mask, dropping anything that is not a modifier key
    /// (for example `MOD_NOREPEAT`).
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: ModifierKeys) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a modifier list such as `"Ctrl+Alt"` or `"Win"`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut mods = ModifierKeys::NONE;
        for part in s.split('+') {
            let upper = part.trim().to_ascii_uppercase();
            if upper.is_empty() {
                continue;
            }
            mods = mods | modifier_from_str(&upper)?;
        }
        Some(mods)
    }
}

impl BitOr for ModifierKeys {
    type Output = ModifierKeys;

    fn bitor(self, rhs: ModifierKeys) -> ModifierKeys {
        ModifierKeys(self.0 | rhs.0)
    }
}

impl fmt::Display for ModifierKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(ModifierKeys::CONTROL) {
            parts.push("Ctrl");
        }
        if self.contains(ModifierKeys::ALT) {
            parts.push("Alt");
        }
        if self.contains(ModifierKeys::SHIFT) {
            parts.push("Shift");
        }
        if self.contains(ModifierKeys::WINDOWS) {
            parts.push("Win");
        }
        write!(f, "{}", parts.join("+"))
    }
}

fn modifier_from_str(upper: &str) -> Option<ModifierKeys> {
    match upper {
        "CTRL" | "CONTROL" => Some(ModifierKeys::CONTROL),
        "ALT" => Some(ModifierKeys::ALT),
        "SHIFT" => Some(ModifierKeys::SHIFT),
        "WIN" | "WINDOWS" | "SUPER" => Some(ModifierKeys::WINDOWS),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotKeyOperation {
    Cut,
    Copy,
    Paste,
}

impl fmt::Display for HotKeyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotKeyOperation::Cut => write!(f, "Cut"),
            HotKeyOperation::Copy => write!(f, "Copy"),
            HotKeyOperation::Paste => write!(f, "Paste"),
        }
    }
}

/// A global key combination bound to one operation of one clipboard slot.
///
/// Equality and hashing only look at the modifier mask and the key. A
/// `WM_HOTKEY` message carries nothing else, so looking up the binding for an
/// incoming event has to compare on exactly that subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotKey {
    pub clipboard_id: i32,
    pub operation: HotKeyOperation,
    /// Win32 virtual key code.
    pub key: u32,
    pub modifiers: ModifierKeys,
    /// Atom id handed to `RegisterHotKey`; `None` until registered.
    #[serde(skip)]
    pub registration_id: Option<u16>,
}

impl HotKey {
    pub fn new(
        clipboard_id: i32,
        operation: HotKeyOperation,
        modifiers: ModifierKeys,
        key: u32,
    ) -> Self {
        Self {
            clipboard_id,
            operation,
            key,
            modifiers,
            registration_id: None,
        }
    }

    /// A hot key as reported by the OS: no slot and no operation attached.
    pub fn observed(modifiers: ModifierKeys, key: u32) -> Self {
        Self::new(0, HotKeyOperation::Copy, modifiers, key)
    }

    /// Decode the `lParam` of a `WM_HOTKEY` message: modifiers in the low
    /// word, virtual key in the high word.
    pub fn from_lparam(lparam: isize) -> Self {
        let raw = lparam as usize;
        let modifiers = ModifierKeys::from_bits((raw & 0xFFFF) as u32);
        let key = ((raw >> 16) & 0xFFFF) as u32;
        Self::observed(modifiers, key)
    }

    pub fn matches(&self, other: &HotKey) -> bool {
        self.modifiers == other.modifiers && self.key == other.key
    }

    /// Same slot and same operation; used when removing a specific binding.
    pub fn is_same_binding(&self, other: &HotKey) -> bool {
        self.clipboard_id == other.clipboard_id && self.operation == other.operation
    }

    /// Name used for the global atom that backs the registration id.
    pub fn atom_name(&self) -> String {
        format!("MultipleClipboards:{self}")
    }
}

impl PartialEq for HotKey {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for HotKey {}

impl Hash for HotKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.modifiers.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Display for HotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", key_name(self.key))
        } else {
            write!(f, "{}+{}", self.modifiers, key_name(self.key))
        }
    }
}

/// Parse a key combination like `"Ctrl+Shift+C"` into modifiers and a
/// virtual key. Exactly one non-modifier key is required.
pub fn parse_hotkey(s: &str) -> Option<(ModifierKeys, u32)> {
    let mut mods = ModifierKeys::NONE;
    let mut key: Option<u32> = None;

    for part in s.split('+') {
        let upper = part.trim().to_ascii_uppercase();
        if upper.is_empty() {
            continue;
        }
        if let Some(m) = modifier_from_str(&upper) {
            mods = mods | m;
            continue;
        }
        if key.is_some() {
            return None;
        }
        key = Some(virtual_key_from_string(&upper)?);
    }

    key.map(|k| (mods, k))
}

const KEY_NAMES: &[(&str, u32)] = &[
    ("BACKSPACE", 0x08),
    ("TAB", 0x09),
    ("ENTER", 0x0D),
    ("PAUSE", 0x13),
    ("CAPSLOCK", 0x14),
    ("ESCAPE", 0x1B),
    ("SPACE", 0x20),
    ("PAGEUP", 0x21),
    ("PAGEDOWN", 0x22),
    ("END", 0x23),
    ("HOME", 0x24),
    ("LEFT", 0x25),
    ("UP", 0x26),
    ("RIGHT", 0x27),
    ("DOWN", 0x28),
    ("PRINTSCREEN", 0x2C),
    ("INSERT", 0x2D),
    ("DELETE", 0x2E),
    ("NUMPAD0", 0x60),
    ("NUMPAD1", 0x61),
    ("NUMPAD2", 0x62),
    ("NUMPAD3", 0x63),
    ("NUMPAD4", 0x64),
    ("NUMPAD5", 0x65),
    ("NUMPAD6", 0x66),
    ("NUMPAD7", 0x67),
    ("NUMPAD8", 0x68),
    ("NUMPAD9", 0x69),
    ("NUMPADMULTIPLY", 0x6A),
    ("NUMPADADD", 0x6B),
    ("NUMPADSUBTRACT", 0x6D),
    ("NUMPADDOT", 0x6E),
    ("NUMPADDIVIDE", 0x6F),
    ("OEM_1", 0xBA),
    ("OEM_PLUS", 0xBB),
    ("OEM_COMMA", 0xBC),
    ("OEM_MINUS", 0xBD),
    ("OEM_PERIOD", 0xBE),
    ("OEM_2", 0xBF),
    ("OEM_3", 0xC0),
    ("OEM_4", 0xDB),
    ("OEM_5", 0xDC),
    ("OEM_6", 0xDD),
    ("OEM_7", 0xDE),
];

/// Map a key name (`"C"`, `"F5"`, `"NUMPAD1"`, ...) to its virtual key code.
pub fn virtual_key_from_string(key: &str) -> Option<u32> {
    let upper = key.trim().to_ascii_uppercase();
    match upper.as_str() {
        "RETURN" => return Some(0x0D),
        "ESC" => return Some(0x1B),
        "DEL" => return Some(0x2E),
        "INS" => return Some(0x2D),
        _ => {}
    }

    if upper.len() == 1 {
        let c = upper.chars().next()?;
        if c.is_ascii_alphabetic() || c.is_ascii_digit() {
            return Some(c as u32);
        }
        return None;
    }

    if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        return (1..=24).contains(&n).then_some(0x6F + n);
    }

    KEY_NAMES
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, vk)| *vk)
}

/// Human readable name for a virtual key code; the inverse of
/// [`virtual_key_from_string`].
pub fn key_name(vk: u32) -> String {
    match vk {
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(vk)
            .map(|c| c.to_string())
            .unwrap_or_default(),
        0x70..=0x87 => format!("F{}", vk - 0x6F),
        _ => KEY_NAMES
            .iter()
            .find(|(_, code)| *code == vk)
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| format!("VK_{vk:#04X}")),
    }
}
