use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_PATH_ENV: &str = "KARTEN_LOG_PATH";

/// The terminal belongs to the UI, so logs only go to the file named by
/// `KARTEN_LOG_PATH`. Without it nothing is installed.
pub fn init() -> io::Result<bool> {
    let Ok(path) = std::env::var(LOG_PATH_ENV) else {
        return Ok(false);
    };
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .is_ok();
    Ok(installed)
}
