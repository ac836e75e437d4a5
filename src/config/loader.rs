//! Config file loading

use crate::config::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn load_config(tree_root: &Path, config_path: Option<&Path>) -> Result<Config> {
    let config_path_provided = config_path.is_some();

    let discovered = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(tree_root),
    };

    let Some(config_file) = discovered else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed reading config file: {}", config_file.display()))?;

    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "toml" => parse_toml_config(&content, &config_file),
        "yaml" | "yml" => parse_yaml_config(&content, &config_file),
        other => Err(anyhow::anyhow!(
            "Unsupported config extension '.{}' for file {}",
            other,
            config_file.display()
        )),
    };

    match parsed {
        Ok(mut cfg) => {
            cfg.normalize();
            Ok(cfg)
        }
        Err(e) => {
            if config_path_provided {
                return Err(e);
            }
            // Auto-discovered: warn and fall back to defaults rather than
            // failing a run the user never pointed at this file.
            tracing::warn!(
                "Failed to parse auto-discovered config {}: {}",
                config_file.display(),
                e
            );
            Ok(Config::default())
        }
    }
}

fn parse_toml_config(content: &str, config_file: &Path) -> Result<Config> {
    toml::from_str(content)
        .with_context(|| format!("Invalid TOML config: {}", config_file.display()))
}

fn parse_yaml_config(content: &str, config_file: &Path) -> Result<Config> {
    serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML config: {}", config_file.display()))
}

fn discover_config(tree_root: &Path) -> Option<std::path::PathBuf> {
    let candidates = [
        "repo-migrate.toml",
        ".repo-migrate.toml",
        "repo-migrate.yml",
        ".repo-migrate.yml",
        "repo-migrate.yaml",
        ".repo-migrate.yaml",
    ];

    for candidate in candidates {
        let path = tree_root.join(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    None
}
