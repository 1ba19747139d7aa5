//! Built-in catalog of infrastructure and services

use anyhow::{Context, Result};
use envkit::Catalog;
use std::fs;
use std::path::Path;

use crate::paths;

const BUILTIN: &str = include_str!("catalog.toml");

/// Load the catalog: `<config dir>/catalog.toml` if present, else built-in
pub fn load() -> Result<Catalog> {
    let override_path = paths::config_dir()?.join("catalog.toml");
    if override_path.exists() {
        log::info!("Using catalog from {}", override_path.display());
        return load_file(&override_path);
    }
    builtin()
}

pub fn builtin() -> Result<Catalog> {
    parse(BUILTIN).context("Built-in catalog is invalid")
}

pub fn load_file(path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid catalog: {}", path.display()))
}

fn parse(content: &str) -> Result<Catalog> {
    let catalog: Catalog = toml::from_str(content)?;
    catalog.validate()?;
    Ok(catalog)
}

/// Whether the host CPU is arm64
pub fn is_arm64_host() -> bool {
    std::env::consts::ARCH == "aarch64"
}
