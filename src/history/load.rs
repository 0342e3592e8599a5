use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use runviz::{GraphRecord, LayoutConfig};

use super::parse::parse_history;

pub fn load_history(path: &Path) -> Result<Vec<GraphRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read run history from {}", path.display()))?;
    let history = parse_history(&raw)
        .with_context(|| format!("failed to parse run history in {}", path.display()))?;
    info!(path = %path.display(), runs = history.len(), "run history loaded");
    Ok(history)
}

/// Reads a layout configuration, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read layout config from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid layout config in {}", path.display()))
}
