#[cfg(windows)]
const WORKER_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use multi_clipboards::clipboard::win32::WindowsClipboard;
    use multi_clipboards::clipboard_window::{ClipboardWindow, SendMessageChain};
    use multi_clipboards::global_hotkey::WindowsHotKeyBackend;
    use multi_clipboards::interceptor::{ClipboardInUse, MessageInterceptor};
    use multi_clipboards::keyboard::SendInputKeyboard;
    use multi_clipboards::logging;
    use multi_clipboards::manager::{ClipboardManager, ManagerBackends};
    use multi_clipboards::notify::{NotificationSink, NullSink, ToastLogSink};
    use multi_clipboards::settings::{self, SettingsFile, SETTINGS_FILE};
    use std::sync::Arc;

    let data_dir = settings::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    let settings_file = Arc::new(SettingsFile::open(data_dir.join(SETTINGS_FILE))?);
    let settings = settings_file.settings();
    settings.validate()?;

    let log_file = settings
        .log_file
        .as_deref()
        .map(|name| settings::resolve(&data_dir, name));
    logging::init(settings.debug_logging, log_file);
    tracing::info!(dir = %data_dir.display(), "starting Multiple Clipboards");

    let mut window = ClipboardWindow::create()?;
    let notifier: Arc<dyn NotificationSink> = if settings.enable_notifications {
        Arc::new(ToastLogSink::new(settings::resolve(
            &data_dir,
            &settings.notification_log,
        )))
    } else {
        Arc::new(NullSink)
    };
    let backends = ManagerBackends {
        clipboard: Arc::new(WindowsClipboard::new(window.hwnd())),
        keyboard: Arc::new(SendInputKeyboard),
        hot_keys: Box::new(WindowsHotKeyBackend::new(window.hwnd())),
        notifier,
        store: settings_file.clone(),
    };
    let manager = Arc::new(ClipboardManager::new(
        settings.manager_config(),
        backends,
        settings.clipboards.clone(),
    ));

    let history_path = settings::resolve(&data_dir, &settings.history_file);
    if settings.persist_history {
        if let Err(err) = manager.load_history(&history_path) {
            tracing::warn!(error = %format!("{err:#}"), "unable to load clipboard history");
        }
    }

    if let Some((modifiers, key)) = settings.quit_hotkey() {
        if let Err(err) = window.register_quit_hot_key(modifiers, key) {
            tracing::warn!(error = %format!("{err:#}"), "unable to register quit hot key");
        }
    }

    let in_use = ClipboardInUse::new();
    window.attach(MessageInterceptor::with_flag(
        Arc::clone(&manager),
        Box::new(SendMessageChain),
        in_use.clone(),
    ));
    let result = window.run();

    // A worker may still hold the user's clipboard contents; let it restore
    // them before the process exits.
    window.detach();
    if !in_use.wait_until_clear(WORKER_SHUTDOWN_TIMEOUT) {
        tracing::warn!("clipboard operation still running at exit");
    }

    if settings.persist_history {
        if let Err(err) = manager.save_history(&history_path) {
            tracing::warn!(error = %format!("{err:#}"), "unable to save clipboard history");
        }
    }
    manager.dispose();
    drop(window);
    tracing::info!("stopped Multiple Clipboards");
    result
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("Multiple Clipboards only runs on Windows")
}
