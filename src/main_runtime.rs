use bulwark::config::LoggingConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Console logging plus an optional daily rolling file.
///
/// The file directory comes from BULWARK_LOG_DIR, then `logging.dir`.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},bulwark=debug", config.level)));

    let log_dir = std::env::var("BULWARK_LOG_DIR")
        .ok()
        .map(PathBuf::from)
        .or_else(|| config.dir.clone());

    // `rolling::daily` panics if it cannot create the first file, so check writability first
    let file_layer = log_dir.as_ref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            return None;
        }
        let probe = dir.join(".bulwark_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&probe) {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
                let appender = tracing_appender::rolling::daily(dir, "bulwark.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                // Lives for the whole process
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                None
            }
        }
    });

    let (plain, json) = if config.json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_target(true)))
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/bulwark.log", dir.display());
    }
}

pub fn init_logging_simple() {
    // Minimal logging for one-shot CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
