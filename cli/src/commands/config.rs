//! Config command - show or initialize configuration.

use anyhow::{bail, Result};
use podfwd_core::{Config, ConfigStore};

pub fn show(store: &ConfigStore, config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let exists = store.config_path().exists();
    println!(
        "Config file:     {}{}",
        store.config_path().display(),
        if exists { "" } else { " (not created, using defaults)" }
    );
    println!("Namespace:       {}", config.namespace);
    println!("Default address: {}", config.default_address);
    println!(
        "kubectl:         {}",
        config
            .kubectl_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(search PATH)".to_string())
    );
    println!(
        "Context:         {}",
        config.context.as_deref().unwrap_or("(current)")
    );
    println!("Ready timeout:   {}s", config.ready_timeout_secs);
    println!("Request timeout: {}s", config.request_timeout_secs);
    Ok(())
}

pub async fn init(store: &ConfigStore, force: bool) -> Result<()> {
    if store.config_path().exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            store.config_path().display()
        );
    }

    store.save(&Config::default()).await?;
    println!("Wrote {}", store.config_path().display());
    Ok(())
}
