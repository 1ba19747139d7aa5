//! User configuration
//!
//! Loaded from `<config dir>/config.toml` (or `config.json`). Every field has
//! a default, so the file is optional and may override single values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    fn parse<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        match self {
            Self::Toml => toml::from_str(content).context("Invalid TOML format"),
            Self::Json => serde_json::from_str(content).context("Invalid JSON format"),
        }
    }
}

/// Find `<name>.toml` or `<name>.json` in a directory, TOML first
pub fn find_config_file(dir: &Path, name: &str) -> Option<(PathBuf, ConfigFormat)> {
    [ConfigFormat::Toml, ConfigFormat::Json]
        .into_iter()
        .map(|format| (dir.join(format!("{name}.{}", format.extension())), format))
        .find(|(path, _)| path.exists())
}

/// Load and parse a config file by base name, if present
pub fn load_config<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Option<(T, PathBuf)>> {
    let Some((path, format)) = find_config_file(dir, name) else {
        return Ok(None);
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let value = format
        .parse(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    log::debug!("Loaded {}", path.display());
    Ok(Some((value, path)))
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub registries: RegistryConfig,
    pub ingress: IngressConfig,
    pub cluster: ClusterConfig,
    pub mirror: MirrorConfig,
}

impl Config {
    /// Load from the config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        let dir = paths::config_dir()?;
        Self::load_from(&dir)
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        Ok(load_config::<Self>(dir, "config")?
            .map(|(config, _)| config)
            .unwrap_or_default())
    }
}

/// Git credential installed into Flux
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Name of the Flux git secret every source references
    pub credential_secret: String,
    /// URL the git secret is created for
    pub credential_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            credential_secret: "github-token".to_string(),
            credential_url: "https://github.com/synpulse-group".to_string(),
        }
    }
}

/// Container registries the cluster pulls from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub ghcr_host: String,
    pub ghcr_secret: String,
    pub jfrog_host: String,
    pub jfrog_secret: String,
    /// OCI helm repository registered as a Flux helm source
    pub helm_repository: String,
    pub helm_source: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ghcr_host: "ghcr.io".to_string(),
            ghcr_secret: "synpulse-ghcr-docker-credential".to_string(),
            jfrog_host: "synpulse.jfrog.io".to_string(),
            jfrog_secret: "synpulse-jfrog-docker-credential".to_string(),
            helm_repository: "oci://synpulse.jfrog.io/pulse8-helm-charts".to_string(),
            helm_source: "pulse8-helm-charts-oci".to_string(),
        }
    }
}

/// Ingress controller and local TLS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// TLS secret probed to decide whether the ingress is installed
    pub tls_secret: String,
    pub namespace: String,
    /// Extra namespaces that receive a copy of the TLS secret
    pub tls_namespaces: Vec<String>,
    pub unit: String,
    pub repository: String,
    pub branch: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            tls_secret: "pulse8-localhost".to_string(),
            namespace: "kube-system".to_string(),
            tls_namespaces: vec!["default".to_string()],
            unit: "pulse8-core-env-ingress-nginx".to_string(),
            repository: "https://github.com/synpulse-group/pulse8-core-env-ingress-nginx.git"
                .to_string(),
            branch: "main".to_string(),
        }
    }
}

/// k3d cluster settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Host ports mapped to the cluster load balancer
    pub ports: Vec<u16>,
    /// CoreDNS rewrite: names matching this regex resolve to `dns_target`
    pub dns_rewrite: String,
    pub dns_target: String,
    /// Host names covered by the local certificate
    pub certificate_hosts: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            ports: vec![80, 443],
            dns_rewrite: r"(.*\.)?local\.synpulse8\.com".to_string(),
            dns_target: "host.k3d.internal".to_string(),
            certificate_hosts: [
                "local.synpulse8.com",
                "*.local.synpulse8.com",
                "pulse8.localhost",
                "*.pulse8.localhost",
                "localhost",
                "127.0.0.1",
                "::1",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// ConfigMap mirroring environment snapshots inside the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub configmap: String,
    pub namespace: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            configmap: "pulse8-core-cli-config".to_string(),
            namespace: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mirror.configmap, "pulse8-core-cli-config");
    }

    #[test]
    fn test_partial_toml_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[cluster]\nports = [8080, 8443]\n\n[mirror]\nnamespace = \"tools\"\n",
        )
        .unwrap();

        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config.cluster.ports, vec![8080, 8443]);
        assert_eq!(config.cluster.dns_target, "host.k3d.internal");
        assert_eq!(config.mirror.namespace, "tools");
        assert_eq!(config.mirror.configmap, "pulse8-core-cli-config");
    }

    #[test]
    fn test_json_config() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.json"),
            r#"{"github": {"credential_secret": "gh"}}"#,
        )
        .unwrap();

        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config.github.credential_secret, "gh");
    }

    #[test]
    fn test_toml_preferred_over_json() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.toml"), "").unwrap();
        fs::write(tmp.path().join("config.json"), "{}").unwrap();

        let (path, format) = find_config_file(tmp.path(), "config").unwrap();
        assert_eq!(format, ConfigFormat::Toml);
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.toml"), "[cluster\n").unwrap();

        let err = Config::load_from(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }
}
