use std::path::Path;

use anyhow::Context;
use musync_core::SyncConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

pub async fn load_config(path: &Path) -> anyhow::Result<SyncConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    SyncConfig::from_json(&raw).with_context(|| format!("invalid config file {}", path.display()))
}
