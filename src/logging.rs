//! Logging bootstrap.
//!
//! Installs `console_log` in the browser and `env_logger` on native targets
//! (unit tests). Messages follow the `event=... module=... status=...`
//! key-value shape.
//!
//! Initialization is idempotent for the same level and never panics.

use log::{info, Level};
use std::sync::OnceLock;

static INIT_LEVEL: OnceLock<Level> = OnceLock::new();

#[cfg(target_arch = "wasm32")]
fn install(level: Level) -> Result<(), log::SetLoggerError> {
    console_log::init_with_level(level)
}

#[cfg(not(target_arch = "wasm32"))]
fn install(level: Level) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .is_test(true)
        .try_init()
}

/// Installs the logger at `level`.
///
/// # Errors
/// - `level` is not one of `error`, `warn`, `info`, `debug`, `trace`.
/// - Logging was already initialized with a different level.
/// - Another `log` backend is already installed.
pub fn init_logging(level: &str) -> Result<(), String> {
    let level = normalize_level(level)?;

    if let Some(existing) = INIT_LEVEL.get() {
        if *existing != level {
            return Err(format!(
                "logging already initialized with level `{existing}`; refusing to switch to `{level}`"
            ));
        }
        return Ok(());
    }

    install(level).map_err(|err| format!("failed to install logger: {err}"))?;
    log::set_max_level(level.to_level_filter());
    let _ = INIT_LEVEL.set(level);

    info!(
        "event=app_start module=ui status=ok level={} version={}",
        level,
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn normalize_level(level: &str) -> Result<Level, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "error" => Ok(Level::Error),
        "warn" | "warning" => Ok(Level::Warn),
        "info" => Ok(Level::Info),
        "debug" => Ok(Level::Debug),
        "trace" => Ok(Level::Trace),
        other => Err(format!("unsupported log level `{other}`")),
    }
}
