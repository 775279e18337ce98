use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pyshell_codec::Mode;
use pyshell_frame::{FrameConfig, Framing, DEFAULT_MAX_FRAME};
use pyshell_process::{LaunchSpec, StdioConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};

/// Interpreter used when no `python_path` is configured.
#[cfg(windows)]
pub const DEFAULT_PYTHON: &str = "python";
/// Interpreter used when no `python_path` is configured.
#[cfg(not(windows))]
pub const DEFAULT_PYTHON: &str = "python3";

/// Options for one channel or helper call.
///
/// Every field is optional. Unset fields fall back to defaults when the
/// channel is spawned, so a set of shared defaults can be layered under
/// per-call options with [`ChannelOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelOptions {
    /// Codec for stdin and stdout. Default: text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Codec for stderr. Default: text, whatever `mode` is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_mode: Option<Mode>,
    /// Interpreter executable. Default: [`DEFAULT_PYTHON`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_path: Option<PathBuf>,
    /// Interpreter flags placed before the script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_options: Option<Vec<String>>,
    /// Directory the script name is resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,
    /// Arguments placed after the script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Working directory of the child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    /// Custom frame terminator, used in both directions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminator: Option<String>,
    /// Stdio wiring. Default: all piped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdio: Option<StdioConfig>,
    /// Largest delimited frame accepted from the child, in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frame_size: Option<usize>,
}

impl ChannelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |message: String| ChannelError::Config {
            path: path.to_path_buf(),
            message,
        };
        let raw = std::fs::read_to_string(path).map_err(|err| config_error(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| config_error(err.to_string()))
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_stderr_mode(mut self, mode: Mode) -> Self {
        self.stderr_mode = Some(mode);
        self
    }

    pub fn with_python_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.python_path = Some(path.into());
        self
    }

    pub fn with_python_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.python_options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add one environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }

    pub fn with_stdio(mut self, stdio: StdioConfig) -> Self {
        self.stdio = Some(stdio);
        self
    }

    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = Some(max);
        self
    }

    /// Layer `overrides` on top of `self`; fields set in `overrides` win.
    ///
    /// Environment maps are merged key by key.
    pub fn merge(&self, overrides: &ChannelOptions) -> ChannelOptions {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }

        let env = match (&self.env, &overrides.env) {
            (Some(base), Some(over)) => {
                let mut merged = base.clone();
                merged.extend(over.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(merged)
            }
            (base, over) => pick(base, over),
        };

        ChannelOptions {
            mode: overrides.mode.or(self.mode),
            stderr_mode: overrides.stderr_mode.or(self.stderr_mode),
            python_path: pick(&self.python_path, &overrides.python_path),
            python_options: pick(&self.python_options, &overrides.python_options),
            script_path: pick(&self.script_path, &overrides.script_path),
            args: pick(&self.args, &overrides.args),
            cwd: pick(&self.cwd, &overrides.cwd),
            env,
            terminator: pick(&self.terminator, &overrides.terminator),
            stdio: overrides.stdio.or(self.stdio),
            max_frame_size: overrides.max_frame_size.or(self.max_frame_size),
        }
    }

    /// Effective stdin/stdout mode.
    pub fn effective_mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    /// Effective stderr mode.
    pub fn effective_stderr_mode(&self) -> Mode {
        self.stderr_mode.unwrap_or(Mode::Text)
    }

    /// Interpreter that will be launched.
    pub fn interpreter(&self) -> PathBuf {
        self.python_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON))
    }

    pub fn effective_stdio(&self) -> StdioConfig {
        self.stdio.unwrap_or_default()
    }

    /// Framing for a stream using `mode`, honoring a custom terminator.
    ///
    /// An empty terminator is treated as unset.
    pub fn framing_for(&self, mode: Mode) -> Framing {
        match self.terminator.as_deref() {
            Some(terminator) if !terminator.is_empty() => mode.framing_with_terminator(terminator),
            _ => mode.framing(),
        }
    }

    /// Frame limits for a stream using `mode`.
    pub fn frame_config(&self, mode: Mode) -> FrameConfig {
        FrameConfig {
            framing: self.framing_for(mode),
            max_frame_size: self.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME),
        }
    }

    /// Where the interpreter will look for `script`.
    ///
    /// Flags such as `-c` or `-m` are passed through untouched; anything else
    /// is joined onto `script_path` when one is set.
    pub fn script_location(&self, script: &str) -> String {
        match &self.script_path {
            Some(dir) if !script.starts_with('-') => {
                dir.join(script).to_string_lossy().into_owned()
            }
            _ => script.to_string(),
        }
    }

    /// Interpreter arguments: options, then the script, then script arguments.
    pub fn command_args(&self, script: &str) -> Vec<String> {
        let mut args = self.python_options.clone().unwrap_or_default();
        args.push(self.script_location(script));
        args.extend(self.args.iter().flatten().cloned());
        args
    }

    /// Full launch description for `script`.
    pub fn launch_spec(&self, script: &str) -> LaunchSpec {
        let mut spec = LaunchSpec::new(self.interpreter())
            .args(self.command_args(script))
            .envs(self.env.clone().unwrap_or_default())
            .stdio(self.effective_stdio());
        if let Some(cwd) = &self.cwd {
            spec = spec.current_dir(cwd);
        }
        spec
    }
}
