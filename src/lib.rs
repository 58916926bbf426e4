//! Jarvis - Voice conversation turn engine
//!
//! Orchestrates spoken conversation turns: capture, end-of-utterance
//! detection, reply generation, playback and the message log.

pub mod config;
pub mod conversation;
pub mod device_id;
pub mod responder;
pub mod services;

use std::path::PathBuf;

use config::GeneralConfig;

/// Directory holding the debug log
pub fn get_log_dir() -> PathBuf {
    config::get_config_dir().join("logs")
}

/// Set up console (and optionally file) logging with local timestamps
///
/// `RUST_LOG` overrides the configured filter. Calling this more than once
/// is harmless; later calls leave the first subscriber in place.
pub fn init_logging(general: &GeneralConfig) {
    use tracing_subscriber::prelude::*;

    /// Format timestamps using the system's local time via chrono
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&general.log_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_file = if general.log_to_file {
        let log_dir = get_log_dir();
        let _ = std::fs::create_dir_all(&log_dir);
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("jarvis-debug.log"))
            .ok()
    } else {
        None
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTimer)
        .with_writer(std::io::stderr);
    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
