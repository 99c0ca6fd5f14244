//! CLI subcommands.

pub mod config;
pub mod forward;
pub mod pods;

use std::path::PathBuf;

use anyhow::Result;
use podfwd_core::{Config, ConfigStore};

/// Opens the config store (default or `--config` path) and loads it.
pub async fn load_config(path: Option<PathBuf>) -> Result<(ConfigStore, Config)> {
    let store = match path {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new()?,
    };
    let config = store.load().await?;
    Ok((store, config))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
