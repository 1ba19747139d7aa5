//! k3d cluster operations and post-creation bootstrap
//!
//! Environments are k3d clusters; the kube context of environment `dev` is
//! `k3d-dev`. Only one environment runs at a time.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::{ClusterConfig, RegistryConfig};
use crate::credentials::Credentials;
use crate::runner::CommandRunner;

const CONTEXT_PREFIX: &str = "k3d-";
const FLUX_NAMESPACE: &str = "flux-system";
const COREDNS_ANCHOR: &str = "ready\n        kubernetes";

/// k3d/kubectl front end bound to a runner
pub struct Cluster<'a, R: CommandRunner> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> Cluster<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Stop every running environment
    pub fn stop_all(&self) -> Result<()> {
        self.runner.run_checked("k3d", &["cluster", "stop", "--all"])?;
        Ok(())
    }

    /// Create the cluster with the load balancer bound to `ports`
    pub fn create(&self, id: &str, ports: &[u16]) -> Result<()> {
        let mut args: Vec<String> = vec!["cluster".into(), "create".into()];
        args.extend(ports.iter().map(|port| format!("-p{port}:{port}@loadbalancer")));
        args.extend([
            "--k3s-arg".to_string(),
            "--disable=traefik@server:0".to_string(),
            id.to_string(),
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run_checked("k3d", &args)
            .with_context(|| format!("Failed to create environment '{id}'"))?;
        Ok(())
    }

    pub fn start(&self, id: &str) -> Result<()> {
        self.runner
            .run_checked("k3d", &["cluster", "start", id])
            .with_context(|| format!("Failed to start environment '{id}'"))?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.runner
            .run_checked("k3d", &["cluster", "delete", id])
            .with_context(|| format!("Failed to delete environment '{id}'"))?;
        Ok(())
    }

    /// Output of `k3d cluster list`, verbatim
    pub fn list(&self) -> Result<String> {
        self.runner.run_capture("k3d", &["cluster", "list"])
    }

    /// Point kubectl at the environment
    pub fn use_context(&self, id: &str) -> Result<()> {
        let context = format!("{CONTEXT_PREFIX}{id}");
        self.runner
            .run_checked("kubectl", &["config", "use-context", &context])?;
        Ok(())
    }

    /// Identifier of the environment kubectl currently points at
    pub fn current_environment(&self) -> Result<String> {
        let context = self
            .runner
            .run_capture("kubectl", &["config", "current-context"])
            .context("Could not determine the current environment")?;
        environment_from_context(&context)
    }

    /// Wait for CoreDNS, add the local DNS rewrite and restart it
    pub fn configure_dns(&self, cluster: &ClusterConfig) -> Result<()> {
        self.kube_system(&["rollout", "status", "deployment", "coredns"])
            .context("Failed to wait for coredns")?;

        let current = self
            .runner
            .run_checked(
                "kubectl",
                &["-n", "kube-system", "get", "configmap", "coredns", "-o", "yaml"],
            )
            .context("Failed to read coredns configuration")?
            .stdout_str();

        match patch_corefile(&current, &cluster.dns_rewrite, &cluster.dns_target) {
            Some(patched) => {
                let file = write_temp(&patched, ".yaml")?;
                let path = path_arg(file.path());
                self.kube_system(&["apply", "-f", &path])
                    .context("Failed to apply coredns configuration")?;
            }
            None => log::warn!("coredns configuration has an unexpected layout, not patched"),
        }

        self.kube_system(&["rollout", "restart", "deployment", "coredns"])
            .context("Failed to restart coredns")?;
        Ok(())
    }

    /// Install the flux controllers
    pub fn install_flux(&self) -> Result<()> {
        self.runner
            .run_checked("flux", &["install"])
            .context("Failed to install flux")?;
        Ok(())
    }

    /// Create image pull secrets for ghcr.io and the JFrog registry
    ///
    /// The JFrog secret is also created in the flux namespace so the helm
    /// source can authenticate with it.
    pub fn install_pull_secrets(
        &self,
        registries: &RegistryConfig,
        credentials: &Credentials,
    ) -> Result<()> {
        let ghcr = credentials.ghcr_dockerconfig(&registries.ghcr_host);
        self.docker_secret(&registries.ghcr_secret, &ghcr, &[None])?;

        let jfrog = credentials.jfrog_dockerconfig(&registries.jfrog_host);
        self.docker_secret(&registries.jfrog_secret, &jfrog, &[None, Some(FLUX_NAMESPACE)])
    }

    /// Register the OCI helm chart repository with flux
    pub fn register_helm_repository(&self, registries: &RegistryConfig) -> Result<()> {
        let url = format!("--url={}", registries.helm_repository);
        let secret = format!("--secret-ref={}", registries.jfrog_secret);
        self.runner
            .run_checked(
                "flux",
                &[
                    "create",
                    "source",
                    "helm",
                    &registries.helm_source,
                    &url,
                    &secret,
                    "--interval=15m",
                ],
            )
            .context("Failed to register helm repository")?;
        Ok(())
    }

    fn kube_system(&self, args: &[&str]) -> Result<()> {
        let mut full = vec!["-n", "kube-system"];
        full.extend_from_slice(args);
        self.runner.run_checked("kubectl", &full)?;
        Ok(())
    }

    /// Create a dockerconfigjson secret in each namespace (`None` is the default one)
    fn docker_secret(&self, name: &str, payload: &str, namespaces: &[Option<&str>]) -> Result<()> {
        let file = write_temp(payload, ".json")?;
        let from_file = format!("--from-file=.dockerconfigjson={}", path_arg(file.path()));

        for namespace in namespaces {
            let mut args = vec![
                "create".to_string(),
                "secret".to_string(),
                "generic".to_string(),
                name.to_string(),
                from_file.clone(),
                "--type=kubernetes.io/dockerconfigjson".to_string(),
            ];
            if let Some(ns) = namespace {
                args.push(format!("--namespace={ns}"));
            }
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            self.runner
                .run_checked("kubectl", &args)
                .with_context(|| format!("Failed to create pull secret '{name}'"))?;
        }
        Ok(())
    }
}

/// Strip the k3d prefix from a kube context name
pub fn environment_from_context(context: &str) -> Result<String> {
    let id = context.trim();
    let id = id.strip_prefix(CONTEXT_PREFIX).unwrap_or(id);
    if id.is_empty() {
        anyhow::bail!("No current environment - create one with 'pulse8 env create'");
    }
    Ok(id.to_string())
}

/// Insert a CoreDNS rewrite rule between the `ready` and `kubernetes` plugins
///
/// Returns `None` when the anchor is missing or the rule is already present.
pub fn patch_corefile(configmap: &str, pattern: &str, target: &str) -> Option<String> {
    if !configmap.contains(COREDNS_ANCHOR) {
        return None;
    }
    let rule = format!("name regex {pattern} {target}");
    if configmap.contains(&rule) {
        return None;
    }
    let replacement = format!(
        "ready\n        rewrite stop {{\n          {rule}\n        }}\n        kubernetes"
    );
    Some(configmap.replacen(COREDNS_ANCHOR, &replacement, 1))
}

fn write_temp(content: &str, suffix: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("pulse8-")
        .suffix(suffix)
        .tempfile()
        .context("Failed to create temporary file")?;
    file.write_all(content.as_bytes())
        .context("Failed to write temporary file")?;
    file.flush()?;
    Ok(file)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::FakeRunner;

    const COREDNS: &str = "\
apiVersion: v1
data:
  Corefile: |
    .:53 {
        errors
        health
        ready
        kubernetes cluster.local in-addr.arpa ip6.arpa {
          pods insecure
        }
        forward . /etc/resolv.conf
    }
kind: ConfigMap
";

    fn credentials() -> Credentials {
        Credentials {
            github_user: "jdoe".into(),
            github_token: "gho_abc".into(),
            jfrog_auth: "amRvZTpzZWNyZXQ=".into(),
            jfrog_user: None,
        }
    }

    #[test]
    fn test_create_maps_ports_and_disables_traefik() {
        let runner = FakeRunner::new();
        Cluster::new(&runner).create("dev", &[80, 443]).unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "k3d cluster create -p80:80@loadbalancer -p443:443@loadbalancer \
                 --k3s-arg --disable=traefik@server:0 dev"
            ]
        );
    }

    #[test]
    fn test_create_failure_names_environment() {
        let runner = FakeRunner::new().fail("k3d cluster create", "port is already allocated");
        let err = Cluster::new(&runner).create("dev", &[80]).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to create environment 'dev'"));
        assert!(message.contains("port is already allocated"));
    }

    #[test]
    fn test_current_environment_strips_prefix() {
        let runner = FakeRunner::new().respond("kubectl config current-context", "k3d-dev\n");
        assert_eq!(Cluster::new(&runner).current_environment().unwrap(), "dev");
    }

    #[test]
    fn test_environment_from_context() {
        assert_eq!(environment_from_context("  k3d-qa \n").unwrap(), "qa");
        assert_eq!(environment_from_context("minikube").unwrap(), "minikube");
        assert!(environment_from_context("k3d-").is_err());
        assert!(environment_from_context("").is_err());
    }

    #[test]
    fn test_patch_corefile_inserts_rewrite_once() {
        let config = ClusterConfig::default();
        let patched = patch_corefile(COREDNS, &config.dns_rewrite, &config.dns_target).unwrap();

        assert!(patched.contains(
            "ready\n        rewrite stop {\n          \
             name regex (.*\\.)?local\\.synpulse8\\.com host.k3d.internal\n        }\n        kubernetes"
        ));
        assert_eq!(patched.matches("rewrite stop").count(), 1);
        assert!(patch_corefile(&patched, &config.dns_rewrite, &config.dns_target).is_none());
    }

    #[test]
    fn test_patch_corefile_unexpected_layout() {
        assert!(patch_corefile("data: {}\n", "x", "y").is_none());
    }

    #[test]
    fn test_configure_dns_sequence() {
        let runner =
            FakeRunner::new().respond("kubectl -n kube-system get configmap coredns", COREDNS);
        Cluster::new(&runner)
            .configure_dns(&ClusterConfig::default())
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], "kubectl -n kube-system rollout status deployment coredns");
        assert!(calls[2].starts_with("kubectl -n kube-system apply -f "));
        assert_eq!(calls[3], "kubectl -n kube-system rollout restart deployment coredns");
    }

    #[test]
    fn test_pull_secrets() {
        let runner = FakeRunner::new();
        Cluster::new(&runner)
            .install_pull_secrets(&RegistryConfig::default(), &credentials())
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert!(
            calls[0].starts_with("kubectl create secret generic synpulse-ghcr-docker-credential")
        );
        assert!(calls[0].ends_with("--type=kubernetes.io/dockerconfigjson"));
        assert!(
            calls[1].starts_with("kubectl create secret generic synpulse-jfrog-docker-credential")
        );
        assert!(calls[2].ends_with("--namespace=flux-system"));
    }

    #[test]
    fn test_helm_repository() {
        let runner = FakeRunner::new();
        Cluster::new(&runner)
            .register_helm_repository(&RegistryConfig::default())
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "flux create source helm pulse8-helm-charts-oci \
                 --url=oci://synpulse.jfrog.io/pulse8-helm-charts \
                 --secret-ref=synpulse-jfrog-docker-credential --interval=15m"
            ]
        );
    }

    #[test]
    fn test_switch_commands() {
        let runner = FakeRunner::new();
        let cluster = Cluster::new(&runner);
        cluster.stop_all().unwrap();
        cluster.start("qa").unwrap();
        cluster.use_context("qa").unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "k3d cluster stop --all",
                "k3d cluster start qa",
                "kubectl config use-context k3d-qa",
            ]
        );
    }
}
