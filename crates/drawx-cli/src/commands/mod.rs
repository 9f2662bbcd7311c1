//! CLI subcommands.

pub mod batch;
pub mod config;
mod order;
pub mod process;
pub mod rules;

use std::path::Path;

use drawx_core::DrawxConfig;
use tracing::debug;

/// Config from `-c`, else the user config file if present, else defaults.
pub(crate) fn load_config(config_path: Option<&str>) -> anyhow::Result<DrawxConfig> {
    if let Some(path) = config_path {
        return DrawxConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return Ok(DrawxConfig::from_file(&default_path)?);
    }

    Ok(DrawxConfig::default())
}
