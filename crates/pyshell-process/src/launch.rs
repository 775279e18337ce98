use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Child;
use tracing::debug;

use crate::error::{ProcessError, Result};

/// Wiring for one of the child's standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioMode {
    /// A pipe owned by the parent.
    #[default]
    Piped,
    /// The parent's own stream.
    Inherit,
    /// `/dev/null` (or the platform equivalent).
    Null,
}

impl StdioMode {
    fn to_stdio(self) -> Stdio {
        match self {
            StdioMode::Piped => Stdio::piped(),
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Null => Stdio::null(),
        }
    }

    /// True when the parent gets a handle to this stream.
    pub fn is_piped(self) -> bool {
        matches!(self, StdioMode::Piped)
    }
}

/// Stdio wiring for stdin, stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StdioConfig {
    #[serde(default)]
    pub stdin: StdioMode,
    #[serde(default)]
    pub stdout: StdioMode,
    #[serde(default)]
    pub stderr: StdioMode,
}

impl StdioConfig {
    /// All three streams piped to the parent.
    pub fn piped() -> Self {
        Self::default()
    }
}

/// Everything needed to start a child: program, arguments, cwd, environment
/// and stdio wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    stdio: StdioConfig,
}

impl LaunchSpec {
    /// Launch `program` with no arguments and all streams piped.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdio: StdioConfig::piped(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments in order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory of the child.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add environment variables on top of the inherited environment.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Override stdio wiring.
    pub fn stdio(mut self, stdio: StdioConfig) -> Self {
        self.stdio = stdio;
        self
    }

    /// Program path, used as given.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed after the program.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if set.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Stdio wiring.
    pub fn stdio_config(&self) -> StdioConfig {
        self.stdio
    }

    /// Build an async command for this launch.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(self.stdio.stdin.to_stdio())
            .stdout(self.stdio.stdout.to_stdio())
            .stderr(self.stdio.stderr.to_stdio());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Build a blocking command for this launch.
    pub fn std_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(self.stdio.stdin.to_stdio())
            .stdout(self.stdio.stdout.to_stdio())
            .stderr(self.stdio.stderr.to_stdio());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Spawn the child. Must be called from within a tokio runtime.
    pub fn spawn(&self) -> Result<Child> {
        debug!(
            program = %self.program.display(),
            args = ?self.args,
            cwd = ?self.cwd,
            "spawning child process"
        );
        let child = self.command().spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), "child process started");
        Ok(child)
    }
}
