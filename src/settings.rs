use crate::clipboard::RetryPolicy;
use crate::error::HotKeyError;
use crate::history::{DEFAULT_HISTORY_LIMIT, HISTORY_FILE, MAX_HISTORY_LIMIT};
use crate::hotkey::{
    parse_hotkey, virtual_key_from_string, HotKey, HotKeyOperation, ModifierKeys,
};
use crate::manager::ManagerConfig;
use crate::notify::NOTIFICATION_LOG_FILE;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.json";
pub const APP_DIR_NAME: &str = "MultipleClipboards";

/// One user defined clipboard slot and its three key bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardDefinition {
    pub id: i32,
    /// Modifier list shared by all three bindings, e.g. `"Ctrl+Alt"`.
    pub modifiers: String,
    pub cut_key: String,
    pub copy_key: String,
    pub paste_key: String,
}

impl ClipboardDefinition {
    pub fn new(
        id: i32,
        modifiers: impl Into<String>,
        cut_key: impl Into<String>,
        copy_key: impl Into<String>,
        paste_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            modifiers: modifiers.into(),
            cut_key: cut_key.into(),
            copy_key: copy_key.into(),
            paste_key: paste_key.into(),
        }
    }

    pub fn modifier_keys(&self) -> Result<ModifierKeys, HotKeyError> {
        ModifierKeys::parse(&self.modifiers)
            .ok_or_else(|| HotKeyError::InvalidSequence(self.modifiers.clone()))
    }

    /// The cut, copy and paste bindings, in that order.
    pub fn hot_keys(&self) -> Result<Vec<HotKey>, HotKeyError> {
        let modifiers = self.modifier_keys()?;
        [
            (HotKeyOperation::Cut, &self.cut_key),
            (HotKeyOperation::Copy, &self.copy_key),
            (HotKeyOperation::Paste, &self.paste_key),
        ]
        .into_iter()
        .map(|(operation, key)| -> Result<HotKey, HotKeyError> {
            let vk = virtual_key_from_string(key)
                .ok_or_else(|| HotKeyError::InvalidSequence(format!("{}+{key}", self.modifiers)))?;
            Ok(HotKey::new(self.id, operation, modifiers, vk))
        })
        .collect()
    }

    /// Display form like `Ctrl + Alt + X/C/V`.
    pub fn description(&self) -> String {
        let modifiers = self
            .modifier_keys()
            .map(|m| m.to_string())
            .unwrap_or_else(|_| self.modifiers.clone());
        let mut parts: Vec<String> = modifiers
            .split('+')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        parts.push(format!(
            "{}/{}/{}",
            self.cut_key.to_ascii_uppercase(),
            self.copy_key.to_ascii_uppercase(),
            self.paste_key.to_ascii_uppercase()
        ));
        parts.join(" + ")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Enables debug level logging; `RUST_LOG` may then refine it.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional log file, relative to the data directory unless absolute.
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_clipboards")]
    pub clipboards: Vec<ClipboardDefinition>,
    /// Maximum number of entries kept in the clipboard history.
    #[serde(default = "default_history_records")]
    pub number_of_historical_records: usize,
    /// Delay after a simulated keystroke before the clipboard is read.
    #[serde(default = "default_thread_delay_ms")]
    pub thread_delay_ms: u64,
    /// Extra attempts when another process holds the clipboard open.
    #[serde(default = "default_retry_count")]
    pub clipboard_retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub clipboard_retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub persist_history: bool,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Send Ctrl+X for cut bindings. Off by default, so cut behaves like copy.
    #[serde(default)]
    pub simulate_cut_keystroke: bool,
    #[serde(default = "default_true")]
    pub enable_notifications: bool,
    #[serde(default = "default_notification_log")]
    pub notification_log: String,
    /// Combination that exits the application. `None` disables it.
    #[serde(default = "default_quit_hotkey")]
    pub quit_hotkey: Option<String>,
}

fn default_clipboards() -> Vec<ClipboardDefinition> {
    vec![ClipboardDefinition::new(1, "Ctrl+Alt", "X", "C", "V")]
}

fn default_history_records() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_thread_delay_ms() -> u64 {
    250
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_history_file() -> String {
    HISTORY_FILE.into()
}

fn default_notification_log() -> String {
    NOTIFICATION_LOG_FILE.into()
}

fn default_quit_hotkey() -> Option<String> {
    Some("Ctrl+Alt+Shift+Q".into())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_file: None,
            clipboards: default_clipboards(),
            number_of_historical_records: default_history_records(),
            thread_delay_ms: default_thread_delay_ms(),
            clipboard_retry_count: default_retry_count(),
            clipboard_retry_delay_ms: default_retry_delay_ms(),
            persist_history: true,
            history_file: default_history_file(),
            simulate_cut_keystroke: false,
            enable_notifications: true,
            notification_log: default_notification_log(),
            quit_hotkey: default_quit_hotkey(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_HISTORY_LIMIT).contains(&self.number_of_historical_records) {
            anyhow::bail!(
                "number_of_historical_records must be between 1 and {MAX_HISTORY_LIMIT}"
            );
        }
        let mut seen = HashSet::new();
        for def in &self.clipboards {
            if def.id <= 0 {
                anyhow::bail!("clipboard id {} is invalid; ids must be positive", def.id);
            }
            if !seen.insert(def.id) {
                anyhow::bail!("clipboard id {} is defined more than once", def.id);
            }
            def.hot_keys()
                .with_context(|| format!("clipboard {} has an invalid key binding", def.id))?;
        }
        Ok(())
    }

    pub fn quit_hotkey(&self) -> Option<(ModifierKeys, u32)> {
        let hotkey = self.quit_hotkey.as_deref()?;
        let parsed = parse_hotkey(hotkey);
        if parsed.is_none() {
            tracing::warn!("provided quit hotkey string '{}' is invalid; quit hotkey disabled", hotkey);
        }
        parsed
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            thread_delay: Duration::from_millis(self.thread_delay_ms),
            retry: RetryPolicy::new(
                self.clipboard_retry_count,
                Duration::from_millis(self.clipboard_retry_delay_ms),
            ),
            history_capacity: self.number_of_historical_records,
            simulate_cut: self.simulate_cut_keystroke,
        }
    }
}

/// Directory holding settings, history and log files.
pub fn data_dir() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve a file name from the settings against `base` unless absolute.
pub fn resolve(base: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Where clipboard definitions are kept; told about every add and remove.
pub trait ClipboardDefinitionStore: Send + Sync {
    fn definitions(&self) -> Vec<ClipboardDefinition>;
    fn add_definition(&self, definition: &ClipboardDefinition) -> anyhow::Result<()>;
    fn remove_definition(&self, id: i32) -> anyhow::Result<()>;
}

/// Definitions kept only in memory.
impl ClipboardDefinitionStore for Mutex<Vec<ClipboardDefinition>> {
    fn definitions(&self) -> Vec<ClipboardDefinition> {
        self.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn add_definition(&self, definition: &ClipboardDefinition) -> anyhow::Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(definition.clone());
        Ok(())
    }

    fn remove_definition(&self, id: i32) -> anyhow::Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|d| d.id != id);
        Ok(())
    }
}

/// A settings file on disk, rewritten whenever a definition changes.
pub struct SettingsFile {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings: Mutex::new(settings),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        Ok(Self::new(path, settings))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, change: impl FnOnce(&mut Settings)) -> anyhow::Result<()> {
        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut settings);
        settings
            .save(&self.path)
            .with_context(|| format!("saving {}", self.path.display()))
    }
}

impl ClipboardDefinitionStore for SettingsFile {
    fn definitions(&self) -> Vec<ClipboardDefinition> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clipboards
            .clone()
    }

    fn add_definition(&self, definition: &ClipboardDefinition) -> anyhow::Result<()> {
        self.update(|s| {
            s.clipboards.retain(|d| d.id != definition.id);
            s.clipboards.push(definition.clone());
        })
    }

    fn remove_definition(&self, id: i32) -> anyhow::Result<()> {
        self.update(|s| s.clipboards.retain(|d| d.id != id))
    }
}
