use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::catalog;
use crate::certs::CertificatePair;
use crate::cluster;
use crate::config::{self, Config};
use crate::credentials::Credentials;
use crate::paths;
use crate::runner::{self, CommandRunner, SystemRunner};
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run() -> Result<()> {
    ui::banner();
    ui::header("Environment Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    // Check 1: Required commands
    check_commands(&mut issues);

    // Check 2: Configuration and catalog
    let config = check_configs(&mut issues);

    // Check 3: Registry and git credentials
    match (paths::gh_hosts_file(), paths::docker_config_file()) {
        (Ok(hosts), Ok(docker)) => {
            check_credentials(&hosts, &docker, &config.registries.jfrog_host, &mut issues);
        }
        (Err(e), _) | (_, Err(e)) => ui::error(&format!("Could not locate credential files: {e}")),
    }

    // Check 4: Local certificates
    check_certificates(&mut issues);

    // Check 5: Current environment
    check_current_environment(&SystemRunner);

    // Summary
    println!();
    if issues.is_empty() {
        ui::success("All systems healthy!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }

    let fix_cmds: Vec<&str> = issues.iter().filter_map(|i| i.fix_cmd.as_deref()).collect();

    if !fix_cmds.is_empty() {
        ui::section("Quick Fixes");
        println!(
            "  {}",
            "Run these commands to resolve the issues above:".dimmed()
        );
        println!();
        for cmd in &fix_cmds {
            println!("    {}", cmd.bold());
        }
    }
}

fn check_commands(issues: &mut Vec<Issue>) {
    ui::section("Required Commands");

    let commands = [
        ("k3d", "Local Kubernetes clusters", "brew install k3d"),
        ("kubectl", "Kubernetes CLI", "brew install kubectl"),
        ("flux", "GitOps toolkit", "brew install fluxcd/tap/flux"),
        ("mkcert", "Local TLS certificates", "brew install mkcert"),
        ("gh", "GitHub CLI", "brew install gh"),
        ("docker", "Container runtime", "Install Docker Desktop or colima"),
    ];

    for (cmd, desc, install_hint) in commands {
        if runner::command_exists(cmd) {
            println!("  {} {} - {}", "✓".green(), cmd, desc.dimmed());
        } else {
            println!("  {} {} - {} {}", "✗".red(), cmd, desc, "(missing)".red());
            issues.push(Issue {
                category: "Required Commands",
                summary: format!("{cmd} is not installed"),
                detail: Some(format!("{desc} - required by pulse8 env")),
                fix: Some(format!("Install {cmd}")),
                fix_cmd: Some(install_hint.to_string()),
            });
        }
    }
}

/// Check config and catalog, returning the config in effect
fn check_configs(issues: &mut Vec<Issue>) -> Config {
    ui::section("Configuration Files");

    let config_dir = match paths::config_dir() {
        Ok(d) => d,
        Err(e) => {
            ui::error("Could not determine config directory");
            issues.push(Issue {
                category: "Configuration Files",
                summary: "Could not determine config directory".into(),
                detail: Some(format!("{e}")),
                fix: Some(format!("Ensure $HOME is set or set {}", paths::ENV_CONFIG_DIR)),
                fix_cmd: None,
            });
            return Config::default();
        }
    };

    let config = match config::find_config_file(&config_dir, "config") {
        Some((path, _)) => match Config::load_from(&config_dir) {
            Ok(config) => {
                println!("  {} {} - {}", "✓".green(), path.display(), "pulse8 config".dimmed());
                config
            }
            Err(e) => {
                let root_cause = format!("{:#}", e.root_cause());
                println!(
                    "  {} {} {}",
                    "⚠".yellow(),
                    path.display(),
                    format!("(parse error: {root_cause})").yellow()
                );
                issues.push(Issue {
                    category: "Configuration Files",
                    summary: "config file has invalid format".into(),
                    detail: Some(format!("{e:#}")),
                    fix: Some(format!("Edit {} and fix the syntax error", path.display())),
                    fix_cmd: Some(format!("$EDITOR {}", path.display())),
                });
                Config::default()
            }
        },
        None => {
            println!(
                "  {} config.toml - pulse8 config {}",
                "○".dimmed(),
                "(using defaults)".dimmed()
            );
            Config::default()
        }
    };

    let catalog_path = config_dir.join("catalog.toml");
    match catalog::load() {
        Ok(catalog) => {
            let source = if catalog_path.exists() {
                catalog_path.display().to_string()
            } else {
                "built-in".to_string()
            };
            println!(
                "  {} catalog - {} infra, {} services {}",
                "✓".green(),
                catalog.infra.len(),
                catalog.services.len(),
                format!("({source})").dimmed()
            );
        }
        Err(e) => {
            println!("  {} catalog {}", "✗".red(), "(invalid)".red());
            issues.push(Issue {
                category: "Configuration Files",
                summary: "catalog is invalid".into(),
                detail: Some(format!("{e:#}")),
                fix: Some(format!("Fix or remove {}", catalog_path.display())),
                fix_cmd: None,
            });
        }
    }

    config
}

fn check_credentials(hosts: &Path, docker: &Path, jfrog_host: &str, issues: &mut Vec<Issue>) {
    ui::section("Credentials");

    match Credentials::load_from(hosts, docker, jfrog_host) {
        Ok(creds) => {
            println!("  {} GitHub - logged in as {}", "✓".green(), creds.github_user);
            let registry_user = creds.jfrog_user.as_deref().unwrap_or("configured");
            println!("  {} {} - {}", "✓".green(), jfrog_host, registry_user.dimmed());
        }
        Err(e) => {
            let reason = format!("{e:#}");
            println!("  {} {}", "✗".red(), reason.red());
            let fix_cmd = if reason.contains("docker login") {
                format!("docker login {jfrog_host}")
            } else {
                "gh auth login".to_string()
            };
            issues.push(Issue {
                category: "Credentials",
                summary: "Credentials are incomplete".into(),
                detail: Some(reason),
                fix: Some("Log in so pulse8 can read the token".into()),
                fix_cmd: Some(fix_cmd),
            });
        }
    }
}

fn check_certificates(issues: &mut Vec<Issue>) {
    ui::section("Certificates");

    let Ok(pair) = CertificatePair::default_location() else {
        ui::error("Could not determine certificates directory");
        return;
    };

    if pair.exists() {
        println!("  {} {}", "✓".green(), pair.cert.display());
    } else {
        println!(
            "  {} {} {}",
            "○".dimmed(),
            pair.cert.display(),
            "(created on next 'pulse8 env create')".dimmed()
        );
        if !runner::command_exists("mkcert") {
            issues.push(Issue {
                category: "Certificates",
                summary: "Local certificates cannot be created".into(),
                detail: Some("mkcert is required to issue them".into()),
                fix: Some("Install mkcert".into()),
                fix_cmd: Some("brew install mkcert".into()),
            });
        }
    }
}

fn check_current_environment<R: CommandRunner>(runner: &R) {
    ui::section("Current Environment");

    match runner.run_capture("kubectl", &["config", "current-context"]) {
        Ok(context) => match cluster::environment_from_context(&context) {
            Ok(id) if context.trim().starts_with("k3d-") => {
                println!("  {} {}", "✓".green(), id);
            }
            _ => println!(
                "  {} {} {}",
                "⚠".yellow(),
                context,
                "(not a pulse8 environment)".yellow()
            ),
        },
        Err(_) => println!(
            "  {} {}",
            "○".dimmed(),
            "(no environment selected)".dimmed()
        ),
    }
}
