//! External command execution
//!
//! Every call to k3d, kubectl, flux and mkcert goes through [`CommandRunner`]
//! so failure handling lives in one place: a non-zero exit becomes an error
//! carrying the command line and the tool's stderr verbatim.

use anyhow::{Context, Result};
use envkit::CommandOutput;
use std::process::{Command, Stdio};

/// Runs external programs
pub trait CommandRunner {
    /// Run a program and capture its output, whatever the exit status
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a program and fail on a non-zero exit
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(program, args)?;
        if !output.success {
            anyhow::bail!(
                "Command failed: {}\n{}",
                display_command(program, args),
                output.stderr_str().trim()
            );
        }
        Ok(output)
    }

    /// Run a program, fail on a non-zero exit, return trimmed stdout
    fn run_capture(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = self.run_checked(program, args)?;
        Ok(output.stdout_str().trim().to_string())
    }

    /// Run a program, returning only whether it succeeded
    fn run_quiet(&self, program: &str, args: &[&str]) -> bool {
        self.run(program, args).map(|o| o.success).unwrap_or(false)
    }
}

/// Runner that spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("$ {}", display_command(program, args));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute: {}", display_command(program, args)))?;
        Ok(output.into())
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Command line as shown in logs and errors, with secrets masked
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|arg| mask_secret(arg)));
    parts.join(" ")
}

fn mask_secret(arg: &str) -> String {
    match arg.split_once('=') {
        Some((flag, _)) if flag == "--password" => format!("{flag}=****"),
        _ => arg.to_string(),
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted runner for tests

    use super::*;
    use std::cell::RefCell;

    /// Records every invocation and answers from a script
    ///
    /// Responses are matched by command-line prefix; unmatched commands
    /// succeed with empty output.
    #[derive(Default)]
    pub struct FakeRunner {
        calls: RefCell<Vec<String>>,
        responses: Vec<(String, CommandOutput)>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer commands starting with `prefix` with `stdout`
        pub fn respond(mut self, prefix: &str, stdout: &str) -> Self {
            self.responses.push((
                prefix.to_string(),
                CommandOutput {
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: Vec::new(),
                    success: true,
                },
            ));
            self
        }

        /// Fail commands starting with `prefix` with `stderr`
        pub fn fail(mut self, prefix: &str, stderr: &str) -> Self {
            self.responses.push((
                prefix.to_string(),
                CommandOutput {
                    stdout: Vec::new(),
                    stderr: stderr.as_bytes().to_vec(),
                    success: false,
                },
            ));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.borrow_mut().push(line.clone());

            let output = self
                .responses
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, output)| output.clone())
                .unwrap_or(CommandOutput {
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    success: true,
                });
            Ok(output)
        }
    }
}
