//! Flux-backed deployer
//!
//! Every unit is a `GitRepository` source named `<unit>-repo` plus a
//! `Kustomization` named `<unit>` pointing at it.

use envkit::{Deployer, Kind, UnitSpec};

use crate::certs::CertificatePair;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::runner::CommandRunner;

const FLUX_NAMESPACE: &str = "flux-system";
const SYNC_INTERVAL: &str = "1m";

/// Applies units to the current cluster with the flux CLI
pub struct FluxDeployer<'a, R: CommandRunner> {
    runner: &'a R,
    config: &'a Config,
    credentials: &'a Credentials,
    certificates: CertificatePair,
}

impl<'a, R: CommandRunner> FluxDeployer<'a, R> {
    pub fn new(
        runner: &'a R,
        config: &'a Config,
        credentials: &'a Credentials,
        certificates: CertificatePair,
    ) -> Self {
        Self {
            runner,
            config,
            credentials,
            certificates,
        }
    }

    fn flux(&self, step: &str, unit: &str, args: &[String]) -> envkit::Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run_checked("flux", &args)
            .map(|_| ())
            .map_err(|e| envkit::Error::deploy(step, unit, format!("{e:#}")))
    }

    fn kubectl(&self, step: &str, unit: &str, args: &[&str]) -> envkit::Result<()> {
        self.runner
            .run_checked("kubectl", args)
            .map(|_| ())
            .map_err(|e| envkit::Error::deploy(step, unit, format!("{e:#}")))
    }
}

impl<R: CommandRunner> Deployer for FluxDeployer<'_, R> {
    fn ensure_credentials(&self) -> envkit::Result<()> {
        let github = &self.config.github;
        log::info!("Installing GitHub token using Flux...");
        let args = vec![
            "create".to_string(),
            "secret".to_string(),
            "git".to_string(),
            github.credential_secret.clone(),
            format!("--url={}", github.credential_url),
            format!("--username={}", self.credentials.github_user),
            format!("--password={}", self.credentials.github_token),
            format!("--namespace={FLUX_NAMESPACE}"),
        ];
        self.flux("install git credential", &github.credential_secret, &args)
    }

    fn has_ingress(&self) -> envkit::Result<bool> {
        let ingress = &self.config.ingress;
        let namespace = format!("--namespace={}", ingress.namespace);
        self.runner
            .run("kubectl", &["get", "secret", &ingress.tls_secret, &namespace])
            .map(|output| output.success)
            .map_err(|e| {
                envkit::Error::deploy("probe ingress", &ingress.tls_secret, format!("{e:#}"))
            })
    }

    fn install_ingress(&self) -> envkit::Result<()> {
        let ingress = &self.config.ingress;
        let key = format!("--key={}", self.certificates.key.display());
        let cert = format!("--cert={}", self.certificates.cert.display());

        let namespaces = std::iter::once(&ingress.namespace).chain(&ingress.tls_namespaces);
        for namespace in namespaces {
            let namespace = format!("--namespace={namespace}");
            self.kubectl(
                "install TLS secret",
                &ingress.tls_secret,
                &["create", "secret", "tls", &ingress.tls_secret, &namespace, &key, &cert],
            )?;
        }

        let unit = UnitSpec {
            kind: Kind::Infra,
            id: "ingress-nginx".to_string(),
            display_name: "Ingress NGINX".to_string(),
            name: ingress.unit.clone(),
            repository: ingress.repository.clone(),
            branch: Some(ingress.branch.clone()),
            ref_name: None,
            path: None,
            namespace: ingress.namespace.clone(),
        };
        self.install_unit(&unit)
    }

    fn install_unit(&self, unit: &UnitSpec) -> envkit::Result<()> {
        log::info!("Installing {} using Flux...", unit.label());
        self.flux(
            "install source",
            &unit.name,
            &source_args(unit, &self.config.github.credential_secret),
        )?;
        self.flux("install kustomization", &unit.name, &kustomization_args(unit))
    }

    fn uninstall_unit(&self, unit: &UnitSpec) -> envkit::Result<()> {
        log::info!("Uninstalling {} using Flux...", unit.label());
        let source = vec![
            "delete".to_string(),
            "source".to_string(),
            "git".to_string(),
            unit.source_name(),
            "-s".to_string(),
        ];
        self.flux("uninstall source", &unit.name, &source)?;

        let kustomization = vec![
            "delete".to_string(),
            "kustomization".to_string(),
            unit.name.clone(),
            "-s".to_string(),
        ];
        self.flux("uninstall kustomization", &unit.name, &kustomization)
    }
}

/// Arguments for `flux create source git`
pub fn source_args(unit: &UnitSpec, secret: &str) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "source".to_string(),
        "git".to_string(),
        unit.source_name(),
        format!("--url={}", unit.repository),
        format!("--secret-ref={secret}"),
    ];
    if let Some(branch) = &unit.branch {
        args.push(format!("--branch={branch}"));
    }
    if let Some(ref_name) = &unit.ref_name {
        args.push(format!("--ref-name={ref_name}"));
    }
    args
}

/// Arguments for `flux create kustomization`
///
/// Services are created without waiting for readiness so a slow image pull
/// does not block the rest of the run.
pub fn kustomization_args(unit: &UnitSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "kustomization".to_string(),
        unit.name.clone(),
        format!("--source=GitRepository/{}", unit.source_name()),
        format!("--interval={SYNC_INTERVAL}"),
        "--prune=true".to_string(),
    ];
    if let Some(path) = &unit.path {
        args.push(format!("--path={path}"));
    }
    args.push(format!("--target-namespace={}", unit.namespace));
    if unit.kind == Kind::Service {
        args.push("--wait=false".to_string());
        args.push("--health-check-timeout=30s".to_string());
    }
    args
}
