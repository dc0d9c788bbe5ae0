//! Registers the helper in the docker client configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Name docker appends to `docker-credential-` to find this helper.
pub const CREDS_STORE: &str = "chamber";

/// Set `credsStore` in `<docker_config_dir>/config.json`, keeping every other setting.
pub fn install(docker_config_dir: &Path) -> Result<()> {
    let path = docker_config_dir.join("config.json");

    let mut config = if path.is_file() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read docker config: {}", path.display()))?;
        if content.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&content)
                .with_context(|| format!("Failed to parse docker config: {}", path.display()))?
            {
                Value::Object(map) => map,
                _ => anyhow::bail!("Docker config is not a JSON object: {}", path.display()),
            }
        }
    } else {
        Map::new()
    };

    config.insert(
        "credsStore".to_string(),
        Value::String(CREDS_STORE.to_string()),
    );

    std::fs::create_dir_all(docker_config_dir).with_context(|| {
        format!(
            "Failed to create docker config dir: {}",
            docker_config_dir.display()
        )
    })?;
    let content = serde_json::to_string_pretty(&Value::Object(config))
        .context("Failed to serialize docker config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write docker config: {}", path.display()))?;

    tracing::info!(path = %path.display(), "registered credential helper");
    Ok(())
}
