use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise logging. With `debug` the default level is `debug` and
/// `RUST_LOG` may override it; otherwise `info` is forced.
///
/// When `log_file` is given a second, non-ANSI layer appends to that file.
/// Calling this again after a subscriber is installed does nothing.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Without debug logging a stray RUST_LOG must not turn on verbose output.
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let file_layer = log_file.and_then(|path| {
        let file_name = path.file_name()?.to_owned();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let appender = tracing_appender::rolling::never(dir, file_name);
        Some(fmt::layer().with_ansi(false).with_writer(appender))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
}
