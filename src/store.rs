//! Snapshot storage backends
//!
//! The local YAML files are authoritative. Each cluster also carries a copy
//! of its own snapshot in a ConfigMap, so a machine that did not create the
//! environment can still see what was selected.

use envkit::{Snapshot, SnapshotStore};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::MirrorConfig;
use crate::runner::CommandRunner;

/// One `<id>.yaml` file per environment
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    dir: PathBuf,
}

impl LocalSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.yaml"))
    }

    /// Identifiers of all environments with a snapshot
    pub fn ids(&self) -> anyhow::Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !is_snapshot_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                ids.push(stem.to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl SnapshotStore for LocalSnapshotStore {
    fn read(&self, id: &str) -> envkit::Result<Option<Snapshot>> {
        let path = self.path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(envkit::Error::snapshot(id, format!("{}: {e}", path.display()))),
        };

        match serde_yaml::from_str(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                log::warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn write(&self, id: &str, snapshot: &Snapshot) -> envkit::Result<()> {
        let err = |e: &dyn std::fmt::Display| envkit::Error::snapshot(id, e.to_string());

        fs::create_dir_all(&self.dir).map_err(|e| err(&e))?;
        let content = serde_yaml::to_string(snapshot).map_err(|e| err(&e))?;

        let mut file = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| err(&e))?;
        file.write_all(content.as_bytes()).map_err(|e| err(&e))?;
        file.persist(self.path(id)).map_err(|e| err(&e))?;
        log::debug!("Saved snapshot {}", self.path(id).display());
        Ok(())
    }

    fn delete(&self, id: &str) -> envkit::Result<()> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(envkit::Error::snapshot(id, e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// Snapshot copy kept in a ConfigMap of the current cluster
pub struct ConfigMapMirror<'a, R: CommandRunner> {
    runner: &'a R,
    config: &'a MirrorConfig,
}

impl<'a, R: CommandRunner> ConfigMapMirror<'a, R> {
    pub fn new(runner: &'a R, config: &'a MirrorConfig) -> Self {
        Self { runner, config }
    }

    fn namespace_arg(&self) -> String {
        format!("--namespace={}", self.config.namespace)
    }
}

impl<R: CommandRunner> SnapshotStore for ConfigMapMirror<'_, R> {
    fn read(&self, id: &str) -> envkit::Result<Option<Snapshot>> {
        let namespace = self.namespace_arg();
        let output = self
            .runner
            .run(
                "kubectl",
                &[&namespace, "get", "configmap", &self.config.configmap, "-o", "yaml"],
            )
            .map_err(|e| envkit::Error::snapshot(id, format!("{e:#}")))?;

        if !output.success {
            let stderr = output.stderr_str();
            if stderr.contains("NotFound") {
                return Ok(None);
            }
            return Err(envkit::Error::snapshot(id, stderr.trim()));
        }

        parse_configmap(id, &output.stdout_str())
    }

    fn write(&self, id: &str, snapshot: &Snapshot) -> envkit::Result<()> {
        let err = |e: &dyn std::fmt::Display| envkit::Error::snapshot(id, e.to_string());

        let content = serde_yaml::to_string(snapshot).map_err(|e| err(&e))?;
        let dir = tempfile::tempdir().map_err(|e| err(&e))?;
        let file = dir.path().join(format!("{id}.yaml"));
        fs::write(&file, content).map_err(|e| err(&e))?;

        let namespace = self.namespace_arg();
        let from_file = format!("--from-file={}", file.display());
        self.runner
            .run_checked(
                "kubectl",
                &[
                    &namespace,
                    "delete",
                    "configmap",
                    &self.config.configmap,
                    "--ignore-not-found=true",
                ],
            )
            .map_err(|e| envkit::Error::snapshot(id, format!("{e:#}")))?;
        self.runner
            .run_checked(
                "kubectl",
                &[&namespace, "create", "configmap", &self.config.configmap, &from_file],
            )
            .map_err(|e| envkit::Error::snapshot(id, format!("{e:#}")))?;
        Ok(())
    }

    /// The ConfigMap lives in the cluster and goes away with it
    fn delete(&self, id: &str) -> envkit::Result<()> {
        log::debug!("mirror of '{}' is removed with its cluster", id);
        Ok(())
    }
}

/// Extract `<id>.yaml` from `kubectl get configmap -o yaml` output
fn parse_configmap(id: &str, yaml: &str) -> envkit::Result<Option<Snapshot>> {
    let configmap: ConfigMap =
        serde_yaml::from_str(yaml).map_err(|e| envkit::Error::snapshot(id, e.to_string()))?;
    let Some(content) = configmap.data.get(&format!("{id}.yaml")) else {
        return Ok(None);
    };
    serde_yaml::from_str(content)
        .map(Some)
        .map_err(|e| envkit::Error::snapshot(id, e.to_string()))
}

fn is_snapshot_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yaml")
}
