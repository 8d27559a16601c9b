//! Initialize device identity.

use anyhow::Result;
use std::path::Path;

use crate::config::{DeviceConfig, NodeConfig, CONFIG_FILE, DEVICE_FILE};

/// Run the init command.
pub async fn run(data_dir: &Path, name: &str) -> Result<()> {
    // Check if already initialized
    if DeviceConfig::exists(data_dir).await {
        anyhow::bail!(
            "Device already initialized. Delete {} to reinitialize.",
            data_dir.join(DEVICE_FILE).display()
        );
    }

    let config = DeviceConfig::new(name);
    config.save(data_dir).await?;
    let wrote_defaults = NodeConfig::default().save_if_missing(data_dir).await?;
    tracing::info!("Initialized device {} in {}", config.user_id, data_dir.display());

    println!("Device initialized successfully!");
    println!();
    println!("  User ID:   {}", config.user_id);
    println!("  Name:      {}", config.name);
    println!("  Data dir:  {}", data_dir.display());
    if wrote_defaults {
        println!("  Settings:  {}", data_dir.join(CONFIG_FILE).display());
    }
    println!();
    println!("Next steps:");
    println!("  1. Add a friend: inperson friends add <name> <user-id>");
    println!("  2. Create an event: inperson create \"BBQ\" --when +2d");

    Ok(())
}
