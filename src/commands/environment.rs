//! `pulse8 env` - create, update, delete and inspect environments

use anyhow::{Context as _, Result};
use colored::Colorize;
use envkit::{
    Catalog, Event, MirroredStore, ReconcileOptions, ReconcilePlan, ReconcileReport, Selection,
    Snapshot, SnapshotStore, reconcile, resolve,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::catalog;
use crate::certs::{self, CertificatePair};
use crate::cli::{CreateArgs, EnvCommand, SelectArgs};
use crate::cluster::Cluster;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::flux::FluxDeployer;
use crate::paths;
use crate::progress::{self, StepProgress};
use crate::prompt;
use crate::runner::{CommandRunner, SystemRunner};
use crate::state::EnvironmentState;
use crate::store::{ConfigMapMirror, LocalSnapshotStore};
use crate::ui;

pub fn run(ctx: &Context, cmd: EnvCommand) -> Result<()> {
    let runner = SystemRunner;
    let env = Environments::new(
        &runner,
        Config::load()?,
        catalog::load()?,
        Layout::resolve()?,
    );

    match cmd {
        EnvCommand::Create(args) => env.create(ctx, &args),
        EnvCommand::Update(args) => env.update(ctx, &args),
        EnvCommand::Delete { id } => env.delete(&id),
        EnvCommand::List => env.list(),
        EnvCommand::Switch { id } => env.switch(&id),
        EnvCommand::Show { id } => env.show(id.as_deref()),
    }
}

/// Where environment data lives on this machine
#[derive(Debug, Clone)]
pub struct Layout {
    pub environments: PathBuf,
    pub state_file: PathBuf,
    pub certificates: CertificatePair,
    pub gh_hosts: PathBuf,
    pub docker_config: PathBuf,
}

impl Layout {
    pub fn resolve() -> Result<Self> {
        Ok(Self {
            environments: paths::environments_dir()?,
            state_file: EnvironmentState::state_file()?,
            certificates: CertificatePair::default_location()?,
            gh_hosts: paths::gh_hosts_file()?,
            docker_config: paths::docker_config_file()?,
        })
    }
}

/// Environment operations on top of a command runner
pub struct Environments<'a, R: CommandRunner> {
    runner: &'a R,
    config: Config,
    catalog: Catalog,
    layout: Layout,
    arm64_host: bool,
}

impl<'a, R: CommandRunner> Environments<'a, R> {
    pub fn new(runner: &'a R, config: Config, catalog: Catalog, layout: Layout) -> Self {
        Self {
            runner,
            config,
            catalog,
            layout,
            arm64_host: catalog::is_arm64_host(),
        }
    }

    fn cluster(&self) -> Cluster<'a, R> {
        Cluster::new(self.runner)
    }

    fn local_store(&self) -> LocalSnapshotStore {
        LocalSnapshotStore::new(&self.layout.environments)
    }

    fn store(&self) -> MirroredStore<LocalSnapshotStore, ConfigMapMirror<'_, R>> {
        MirroredStore::new(
            self.local_store(),
            ConfigMapMirror::new(self.runner, &self.config.mirror),
        )
    }

    fn load_state(&self) -> Result<EnvironmentState> {
        EnvironmentState::load_from(&self.layout.state_file)
    }

    fn save_state(&self, state: &mut EnvironmentState) -> Result<()> {
        state.save_to(&self.layout.state_file)
    }

    // ========================================================================
    // Create
    // ========================================================================

    pub fn create(&self, ctx: &Context, args: &CreateArgs) -> Result<()> {
        let id = args.id.as_str();
        let base = self.base_snapshot(args)?;

        let mut catalog = self.catalog.clone();
        if let Some(base) = &base {
            catalog.apply_service_records(&base.services);
        }
        let preselection = base
            .as_ref()
            .map(Snapshot::selection)
            .unwrap_or_else(|| catalog.defaults.clone());

        let selection = self.choose(&catalog, &preselection, &args.select)?;
        let plan = ReconcilePlan::build(id, None, &selection, &catalog);

        if args.select.dry_run {
            print_plan(&plan);
            return Ok(());
        }

        let mut state = self.load_state()?;
        state.apply(id, Event::Create)?;

        let credentials = self.precheck()?;
        self.bootstrap(id, &credentials)?;
        self.save_state(&mut state)?;

        self.apply_plan(ctx, &plan, &credentials, &mut state)
    }

    /// Snapshot a new environment starts from (`--from-env` / `--from-file`)
    fn base_snapshot(&self, args: &CreateArgs) -> Result<Option<Snapshot>> {
        if let Some(source) = &args.from_env {
            let snapshot = self
                .local_store()
                .read(source)?
                .with_context(|| format!("No snapshot for environment '{source}'"))?;
            return Ok(Some(snapshot));
        }
        if let Some(path) = &args.from_file {
            return read_snapshot_file(path).map(Some);
        }
        Ok(None)
    }

    /// Cluster creation and the setup every environment needs before units
    fn bootstrap(&self, id: &str, credentials: &Credentials) -> Result<()> {
        let cluster = self.cluster();
        let config = &self.config;
        ui::info(&format!("Creating environment '{}'...", id.bold()));

        run_stage(1, "Stopping running environments", || cluster.stop_all())?;
        run_stage(2, "Creating k3d cluster", || cluster.create(id, &config.cluster.ports))?;
        run_stage(3, "Configuring cluster DNS", || cluster.configure_dns(&config.cluster))?;
        run_stage(4, "Installing flux", || cluster.install_flux())?;
        run_stage(5, "Installing pull secrets", || {
            cluster.install_pull_secrets(&config.registries, credentials)
        })?;
        run_stage(6, "Registering helm repository", || {
            cluster.register_helm_repository(&config.registries)
        })
    }

    // ========================================================================
    // Update
    // ========================================================================

    pub fn update(&self, ctx: &Context, args: &SelectArgs) -> Result<()> {
        let id = self.cluster().current_environment()?;
        let store = self.store();

        let old = store.read(&id)?;
        if old.is_none() {
            ui::warn(&format!("No previous snapshot for '{id}', nothing will be uninstalled"));
        }
        let mirrored = store.read_mirror(&id)?;

        let mut catalog = self.catalog.clone();
        if let Some(snapshot) = &mirrored {
            catalog.apply_service_records(&snapshot.services);
        }
        let preselection = mirrored
            .as_ref()
            .map(Snapshot::selection)
            .unwrap_or_else(|| catalog.defaults.clone());

        let selection = self.choose(&catalog, &preselection, args)?;
        let plan = ReconcilePlan::build(&id, old.as_ref(), &selection, &catalog);

        if args.dry_run {
            print_plan(&plan);
            return Ok(());
        }

        let summary = plan.summary();
        if summary.has_uninstalls() && !args.is_non_interactive() {
            print_plan(&plan);
            if !prompt::confirm(&format!("Uninstall {} unit(s)?", summary.uninstalls))? {
                ui::info("Cancelled");
                return Ok(());
            }
        }

        let mut state = self.load_state()?;
        state.adopt(&id);
        state.apply(&id, Event::BeginUpdate)?;
        self.save_state(&mut state)?;

        let credentials = self.precheck()?;
        self.apply_plan(ctx, &plan, &credentials, &mut state)
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    /// Credentials and certificates every deploying command needs
    fn precheck(&self) -> Result<Credentials> {
        let credentials = Credentials::load_from(
            &self.layout.gh_hosts,
            &self.layout.docker_config,
            &self.config.registries.jfrog_host,
        )
        .context("Environment precheck failed")?;

        if certs::ensure(
            self.runner,
            &self.layout.certificates,
            &self.config.cluster.certificate_hosts,
        )? {
            ui::success("Created local certificates");
        }
        log::info!("environment precheck done");
        Ok(credentials)
    }

    /// Selection from flags or prompt, closed under dependencies
    fn choose(
        &self,
        catalog: &Catalog,
        preselection: &Selection,
        args: &SelectArgs,
    ) -> Result<Selection> {
        let mut selection = if args.is_non_interactive() {
            prompt::from_flags(args, preselection)
        } else {
            prompt::select(catalog, preselection, self.arm64_host)?
        };

        let before = selection.clone();
        resolve(&mut selection, &catalog.dependency_tables());
        if selection != before {
            let added = Selection {
                infra: selection.infra.difference(&before.infra).cloned().collect(),
                services: selection.services.difference(&before.services).cloned().collect(),
            };
            ui::info(&format!(
                "Added dependencies: {}",
                ui::id_list(added.infra.iter().chain(&added.services).map(String::as_str))
            ));
        }

        for (kind, id) in catalog.unknown(&selection) {
            ui::warn(&format!("Unknown {kind} '{id}' will be skipped"));
        }
        Ok(selection)
    }

    fn apply_plan(
        &self,
        ctx: &Context,
        plan: &ReconcilePlan,
        credentials: &Credentials,
        state: &mut EnvironmentState,
    ) -> Result<()> {
        let deployer = FluxDeployer::new(
            self.runner,
            &self.config,
            credentials,
            self.layout.certificates.clone(),
        );
        let store = self.store();
        let mut progress = StepProgress::new(ctx.quiet);
        let opts = ReconcileOptions::default();

        match reconcile(plan, &deployer, &store, &mut progress, &opts) {
            Ok(report) => {
                state.apply(&plan.environment, Event::Reconcile)?;
                self.save_state(state)?;
                print_report(&plan.environment, &report);
                Ok(())
            }
            Err(e) => {
                state.record_failure(&plan.environment, &e.to_string());
                if let Err(save_err) = self.save_state(state) {
                    log::warn!("could not record failure: {save_err:#}");
                }
                Err(e).with_context(|| format!("Reconciling '{}' failed", plan.environment))
            }
        }
    }

    // ========================================================================
    // Delete / List / Switch / Show
    // ========================================================================

    pub fn delete(&self, id: &str) -> Result<()> {
        let pb = progress::spinner(&format!("Deleting environment '{id}'..."));
        if let Err(e) = self.cluster().delete(id) {
            progress::finish_error(&pb, &format!("Failed to delete '{id}'"));
            return Err(e);
        }
        progress::finish_success(&pb, &format!("Deleted environment '{id}'"));

        if let Err(e) = self.local_store().delete(id) {
            ui::warn(&format!("Could not remove snapshot of '{id}': {e}"));
        }

        let mut state = self.load_state()?;
        match state.apply(id, Event::Delete) {
            Ok(_) => self.save_state(&mut state)?,
            Err(e) => log::warn!("{e:#}"),
        }
        Ok(())
    }

    pub fn list(&self) -> Result<()> {
        println!("{}", self.cluster().list()?);

        let state = self.load_state()?;
        let mut ids = self.local_store().ids()?;
        ids.extend(state.environments.keys().cloned());
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Ok(());
        }
        ui::section("Known environments");
        for id in ids {
            let updated = state
                .get(&id)
                .map(|record| record.updated_at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!(
                "  {:<20} {:<12} {}",
                id.bold(),
                ui::phase(state.phase(&id)),
                updated.dimmed()
            );
        }
        Ok(())
    }

    pub fn switch(&self, id: &str) -> Result<()> {
        let cluster = self.cluster();
        cluster.stop_all()?;
        cluster.start(id)?;
        cluster.use_context(id)?;
        ui::success(&format!("Switched to environment '{id}'"));
        Ok(())
    }

    pub fn show(&self, id: Option<&str>) -> Result<()> {
        let id = match id {
            Some(id) => id.to_string(),
            None => self.cluster().current_environment()?,
        };

        let snapshot = match self.local_store().read(&id)? {
            Some(snapshot) => snapshot,
            None => ConfigMapMirror::new(self.runner, &self.config.mirror)
                .read(&id)
                .unwrap_or_else(|e| {
                    log::warn!("{e}");
                    None
                })
                .with_context(|| format!("No snapshot for environment '{id}'"))?,
        };

        let state = self.load_state()?;
        ui::header(&format!("Environment {id}"));
        ui::kv("Phase", &ui::phase(state.phase(&id)));
        if let Some(error) = state.get(&id).and_then(|r| r.last_error.as_deref()) {
            ui::kv("Last error", &error.red().to_string());
        }
        ui::kv("Infra", &ui::id_list(snapshot.infra.iter().map(String::as_str)));
        ui::kv("Services", &ui::id_list(snapshot.active_services()));
        ui::kv("Suspended", &ui::id_list(snapshot.suspended_services()));
        Ok(())
    }
}

const BOOTSTRAP_STAGES: usize = 6;

fn run_stage<F>(index: usize, label: &str, stage: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let pb = progress::spinner(&format!("[{index}/{BOOTSTRAP_STAGES}] {label}..."));
    match stage() {
        Ok(()) => {
            progress::finish_success(&pb, label);
            Ok(())
        }
        Err(e) => {
            progress::finish_error(&pb, label);
            Err(e)
        }
    }
}

fn read_snapshot_file(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid snapshot file: {}", path.display()))
}

fn print_plan(plan: &ReconcilePlan) {
    ui::header(&format!("Plan for {}", plan.environment));
    for (index, step) in plan.steps.iter().enumerate() {
        ui::step(index + 1, plan.len(), &step.describe());
    }
    for (action, reason) in &plan.skipped {
        ui::dim(&format!("skip {action}: {reason}"));
    }
    let summary = plan.summary();
    println!();
    ui::info(&format!(
        "{} install(s), {} uninstall(s)",
        summary.installs, summary.uninstalls
    ));
}

fn print_report(id: &str, report: &ReconcileReport) {
    let summary = &report.summary;
    println!();
    ui::success(&format!(
        "Environment '{}' reconciled: {} installed, {} uninstalled",
        id, summary.installed, summary.uninstalled
    ));
    for (action, reason) in &report.skipped {
        ui::warn(&format!("Skipped {action}: {reason}"));
    }
    if let Some(error) = &report.persist_error {
        ui::warn(&format!("Snapshot was not saved: {error}"));
    }
}
