//! Centralized path resolution for pulse8
//!
//! # Environment Variables
//!
//! - `PULSE8_HOME` - Override the data directory holding snapshots and
//!   certificates (default `~/.pulse8`)
//! - `PULSE8_CONFIG_DIR` - Override config directory
//! - `PULSE8_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `PULSE8_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/pulse8` (if set)
//! 3. `~/.config/pulse8`
//!
//! For state_dir():
//! 1. `PULSE8_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/pulse8` (if set)
//! 3. `~/.local/state/pulse8`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the data directory override
pub const ENV_HOME: &str = "PULSE8_HOME";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "PULSE8_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "PULSE8_STATE_DIR";

/// Data directory (`~/.pulse8`), shared with earlier versions of the tool
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_HOME) {
        let path = expand(&dir);
        log::debug!("Using data dir from {}: {}", ENV_HOME, path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".pulse8"))
}

/// Directory holding one `<id>.yaml` snapshot per environment
pub fn environments_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join("environments"))
}

/// Directory holding the local TLS key and certificate
pub fn certificates_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join("certificates"))
}

/// Get the pulse8 config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("pulse8");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("pulse8"))
}

/// Get the pulse8 state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("pulse8");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("pulse8"))
}

/// GitHub CLI hosts file holding the logged-in user and token
pub fn gh_hosts_file() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("GitHub CLI").join("hosts.yml"));
        }
    }

    if let Ok(dir) = std::env::var("GH_CONFIG_DIR") {
        return Ok(expand(&dir).join("hosts.yml"));
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("gh").join("hosts.yml"))
}

/// Docker client config holding registry credentials
pub fn docker_config_file() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
        return Ok(expand(&dir).join("config.json"));
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".docker").join("config.json"))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}


#[cfg(test)]
mod tests {
    use super::test_env::{lock, with_env_var, without_env_var};
    use super::*;

    #[test]
    fn test_home_dir_env_override() {
        let _guard = lock();
        with_env_var(ENV_HOME, "/custom/pulse8", || {
            assert_eq!(home_dir().unwrap(), PathBuf::from("/custom/pulse8"));
            assert_eq!(
                environments_dir().unwrap(),
                PathBuf::from("/custom/pulse8/environments")
            );
            assert_eq!(
                certificates_dir().unwrap(),
                PathBuf::from("/custom/pulse8/certificates")
            );
        });
    }

    #[test]
    fn test_home_dir_default() {
        let _guard = lock();
        without_env_var(ENV_HOME, || {
            let home = dirs::home_dir().unwrap();
            assert_eq!(home_dir().unwrap(), home.join(".pulse8"));
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let _guard = lock();
        let home = dirs::home_dir().unwrap();
        with_env_var(ENV_CONFIG_DIR, "~/dotfiles/pulse8", || {
            assert_eq!(config_dir().unwrap(), home.join("dotfiles").join("pulse8"));
        });
    }

    #[test]
    fn test_xdg_state_home() {
        let _guard = lock();
        without_env_var(ENV_STATE_DIR, || {
            with_env_var("XDG_STATE_HOME", "/tmp/xdg-state-test", || {
                let result = state_dir().unwrap();
                assert_eq!(result, PathBuf::from("/tmp/xdg-state-test/pulse8"));
            });
        });
    }

    #[test]
    fn test_docker_config_override() {
        let _guard = lock();
        with_env_var("DOCKER_CONFIG", "/tmp/docker-test", || {
            assert_eq!(
                docker_config_file().unwrap(),
                PathBuf::from("/tmp/docker-test/config.json")
            );
        });
    }

    #[test]
    fn test_expand_with_env_var() {
        let _guard = lock();
        with_env_var("PULSE8_TEST_VAR", "test_value", || {
            let result = expand("/path/$PULSE8_TEST_VAR/file");
            assert_eq!(result, PathBuf::from("/path/test_value/file"));
        });
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_ensure_dir_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
