//! Registry and git credentials
//!
//! Credentials are not stored by pulse8. They are read from the GitHub CLI
//! hosts file and the docker client config, which `gh auth login` and
//! `docker login` maintain.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const GITHUB_HOST: &str = "github.com";

/// Credentials needed to bootstrap an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub github_user: String,
    pub github_token: String,
    /// Base64 `user:token` pair as stored by `docker login`
    pub jfrog_auth: String,
    pub jfrog_user: Option<String>,
}

impl Credentials {
    pub fn load_from(hosts_file: &Path, docker_config: &Path, jfrog_host: &str) -> Result<Self> {
        let github = read_github(hosts_file)?;
        let registry = read_registry(docker_config, jfrog_host)?;

        Ok(Self {
            github_user: github.user,
            github_token: github.oauth_token,
            jfrog_auth: registry.auth,
            jfrog_user: registry.email,
        })
    }

    /// `.dockerconfigjson` payload for ghcr.io, authenticated as the GitHub user
    pub fn ghcr_dockerconfig(&self, host: &str) -> String {
        let auth = STANDARD.encode(format!("{}:{}", self.github_user, self.github_token));
        dockerconfig(host, &auth)
    }

    /// `.dockerconfigjson` payload for the JFrog registry
    pub fn jfrog_dockerconfig(&self, host: &str) -> String {
        dockerconfig(host, &self.jfrog_auth)
    }
}

fn dockerconfig(host: &str, auth: &str) -> String {
    serde_json::json!({ "auths": { host: { "auth": auth } } }).to_string()
}

#[derive(Debug, Deserialize)]
struct GithubHost {
    user: String,
    oauth_token: String,
}

fn read_github(path: &Path) -> Result<GithubHost> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Could not read {} - log in with 'gh auth login'",
            path.display()
        )
    })?;
    let mut hosts: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid GitHub CLI hosts file: {}", path.display()))?;
    let host = hosts
        .remove(GITHUB_HOST)
        .with_context(|| format!("No {GITHUB_HOST} login in {}", path.display()))?;
    serde_yaml::from_value(host)
        .with_context(|| format!("Incomplete {GITHUB_HOST} login in {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, RegistryAuth>,
}

#[derive(Debug, Deserialize)]
struct RegistryAuth {
    auth: String,
    #[serde(default)]
    email: Option<String>,
}

fn read_registry(path: &Path, host: &str) -> Result<RegistryAuth> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Could not read {} - log in with 'docker login {host}'",
            path.display()
        )
    })?;
    let mut config: DockerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid docker config: {}", path.display()))?;
    config
        .auths
        .remove(host)
        .with_context(|| {
            format!(
                "No {host} login in {} - run 'docker login {host}'",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: &str = "\
github.com:
    user: jdoe
    oauth_token: gho_abc123
    git_protocol: https
";

    const DOCKER: &str = r#"{
  "auths": {
    "synpulse.jfrog.io": { "auth": "amRvZTpzZWNyZXQ=", "email": "jane.doe@synpulse.com" },
    "ghcr.io": { "auth": "eA==" }
  }
}"#;

    fn write_fixtures(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let hosts = dir.join("hosts.yml");
        let docker = dir.join("config.json");
        fs::write(&hosts, HOSTS).unwrap();
        fs::write(&docker, DOCKER).unwrap();
        (hosts, docker)
    }

    #[test]
    fn test_load_credentials() {
        let tmp = tempfile::tempdir().unwrap();
        let (hosts, docker) = write_fixtures(tmp.path());

        let creds = Credentials::load_from(&hosts, &docker, "synpulse.jfrog.io").unwrap();
        assert_eq!(creds.github_user, "jdoe");
        assert_eq!(creds.github_token, "gho_abc123");
        assert_eq!(creds.jfrog_auth, "amRvZTpzZWNyZXQ=");
        assert_eq!(creds.jfrog_user.as_deref(), Some("jane.doe@synpulse.com"));
    }

    #[test]
    fn test_missing_registry_login() {
        let tmp = tempfile::tempdir().unwrap();
        let (hosts, docker) = write_fixtures(tmp.path());

        let err = Credentials::load_from(&hosts, &docker, "other.jfrog.io").unwrap_err();
        assert!(err.to_string().contains("docker login other.jfrog.io"));
    }

    #[test]
    fn test_missing_hosts_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, docker) = write_fixtures(tmp.path());

        let err = Credentials::load_from(&tmp.path().join("nope.yml"), &docker, "synpulse.jfrog.io")
            .unwrap_err();
        assert!(err.to_string().contains("gh auth login"));
    }

    #[test]
    fn test_dockerconfig_payloads() {
        let tmp = tempfile::tempdir().unwrap();
        let (hosts, docker) = write_fixtures(tmp.path());
        let creds = Credentials::load_from(&hosts, &docker, "synpulse.jfrog.io").unwrap();

        let ghcr: serde_json::Value =
            serde_json::from_str(&creds.ghcr_dockerconfig("ghcr.io")).unwrap();
        let auth = ghcr["auths"]["ghcr.io"]["auth"].as_str().unwrap();
        assert_eq!(STANDARD.decode(auth).unwrap(), b"jdoe:gho_abc123");

        let jfrog: serde_json::Value =
            serde_json::from_str(&creds.jfrog_dockerconfig("synpulse.jfrog.io")).unwrap();
        assert_eq!(jfrog["auths"]["synpulse.jfrog.io"]["auth"], "amRvZTpzZWNyZXQ=");
    }
}
