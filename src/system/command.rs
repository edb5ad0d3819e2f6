//! Builder for spawning external tools and capturing their output.

use crate::error::{CommandError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Exit code was zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// An external command to run in a given directory.
///
/// ```rust,ignore
/// let out = ExternalCommand::new("bundle")
///     .args(["exec", "rails", "db:migrate:status"])
///     .env("RAILS_ENV", "production")
///     .current_dir("/home/mastodon/live")
///     .run()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl ExternalCommand {
    /// Start building a command for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run in `dir`
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Command line as shown to the operator
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run and capture output, whatever the exit code
    pub async fn output(&self) -> Result<CommandOutput> {
        let display = self.display();
        log::debug!("Running: {}", display);

        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| CommandError::SpawnFailed {
            command: display.clone(),
            reason: e.to_string(),
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log::debug!("'{}' exited with {:?}", display, result.code);
        Ok(result)
    }

    /// Run and require a zero exit code, returning stdout
    pub async fn run(&self) -> Result<String> {
        let output = self.output().await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(CommandError::NonZeroExit {
                command: self.display(),
                code: output.code,
                stderr: output.stderr,
            }
            .into())
        }
    }
}
