//! Local TLS certificates (mkcert)

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::runner::CommandRunner;

/// Key and certificate used for the cluster ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePair {
    pub key: PathBuf,
    pub cert: PathBuf,
}

impl CertificatePair {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            key: dir.join("key.pem"),
            cert: dir.join("cert.pem"),
        }
    }

    /// Pair in the default certificates directory
    pub fn default_location() -> Result<Self> {
        Ok(Self::in_dir(&paths::certificates_dir()?))
    }

    pub fn exists(&self) -> bool {
        self.key.exists() && self.cert.exists()
    }
}

/// Create the certificate pair with mkcert unless it already exists
///
/// Returns `true` if new certificates were issued.
pub fn ensure<R: CommandRunner>(
    runner: &R,
    pair: &CertificatePair,
    hosts: &[String],
) -> Result<bool> {
    if pair.exists() {
        log::debug!("certificates already exist in {}", pair.cert.display());
        return Ok(false);
    }

    if let Some(dir) = pair.key.parent() {
        paths::ensure_dir(dir)?;
    }

    runner.run_checked("mkcert", &["--install"])?;

    let key = pair.key.to_string_lossy();
    let cert = pair.cert.to_string_lossy();
    let mut args = vec!["-key-file", key.as_ref(), "-cert-file", cert.as_ref()];
    args.extend(hosts.iter().map(String::as_str));
    runner.run_checked("mkcert", &args)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::FakeRunner;
    use std::fs;

    #[test]
    fn test_existing_certificates_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let pair = CertificatePair::in_dir(tmp.path());
        fs::write(&pair.key, "key").unwrap();
        fs::write(&pair.cert, "cert").unwrap();

        let runner = FakeRunner::new();
        assert!(!ensure(&runner, &pair, &["localhost".to_string()]).unwrap());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_issues_certificates_for_hosts() {
        let tmp = tempfile::tempdir().unwrap();
        let pair = CertificatePair::in_dir(&tmp.path().join("certificates"));
        let runner = FakeRunner::new();
        let hosts = vec!["localhost".to_string(), "*.pulse8.localhost".to_string()];

        assert!(ensure(&runner, &pair, &hosts).unwrap());

        let calls = runner.calls();
        assert_eq!(calls[0], "mkcert --install");
        assert!(calls[1].starts_with("mkcert -key-file "));
        assert!(calls[1].ends_with("cert.pem localhost *.pulse8.localhost"));
        assert!(tmp.path().join("certificates").is_dir());
    }

    #[test]
    fn test_mkcert_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let pair = CertificatePair::in_dir(tmp.path());
        let runner = FakeRunner::new().fail("mkcert --install", "no trust store");

        let err = ensure(&runner, &pair, &[]).unwrap_err();
        assert!(err.to_string().contains("no trust store"));
    }
}
