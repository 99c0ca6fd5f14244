//! Tracing subscriber setup.
//!
//! The TUI owns the terminal, so interactive sessions log to
//! `~/.podfwd/podfwd.log`; plain commands log to stderr.

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "podfwd.log";

pub fn setup_logging(verbose: bool, to_file: bool) -> Result<()> {
    let log_level = if verbose { "debug" } else { "info" };

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if to_file {
        let dir = podfwd_core::config::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init();
    }

    Ok(())
}
