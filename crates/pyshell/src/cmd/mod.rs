use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use pyshell_channel::{ChannelOptions, Mode};

use crate::exit::{channel_error, CliResult};
use crate::output::OutputFormat;

pub mod check;
pub mod exec;
pub mod run;
pub mod session;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a script and print its messages.
    Run(RunArgs),
    /// Run inline code (`python -c`).
    Exec(ExecArgs),
    /// Check that code compiles without running it.
    Check(CheckArgs),
    /// Show pyshell and interpreter versions.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Exec(args) => exec::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Text,
    Json,
    Binary,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => Mode::Text,
            ModeArg::Json => Mode::Json,
            ModeArg::Binary => Mode::Binary,
        }
    }
}

/// Interpreter and codec flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct InterpreterArgs {
    /// Python interpreter to launch.
    #[arg(long, value_name = "PATH", env = "PYSHELL_PYTHON")]
    pub python: Option<PathBuf>,
    /// Directory scripts are resolved against.
    #[arg(long, value_name = "DIR", env = "PYSHELL_SCRIPT_PATH")]
    pub script_path: Option<PathBuf>,
    /// Interpreter flag placed before the script (repeatable).
    #[arg(long = "python-option", value_name = "FLAG", allow_hyphen_values = true)]
    pub python_options: Vec<String>,
    /// Working directory of the child.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
    /// Message codec for stdin and stdout.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Message codec for stderr.
    #[arg(long, value_enum)]
    pub stderr_mode: Option<ModeArg>,
    /// Custom message terminator.
    #[arg(long)]
    pub terminator: Option<String>,
    /// JSON file with default channel options; flags override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl InterpreterArgs {
    /// Options from `--config`, overridden by explicit flags.
    pub fn options(&self) -> CliResult<ChannelOptions> {
        let base = match &self.config {
            Some(path) => ChannelOptions::from_json_file(path)
                .map_err(|err| channel_error("invalid --config", err))?,
            None => ChannelOptions::default(),
        };
        let flags = ChannelOptions {
            mode: self.mode.map(Mode::from),
            stderr_mode: self.stderr_mode.map(Mode::from),
            python_path: self.python.clone(),
            python_options: (!self.python_options.is_empty())
                .then(|| self.python_options.clone()),
            script_path: self.script_path.clone(),
            cwd: self.cwd.clone(),
            terminator: self.terminator.clone(),
            ..ChannelOptions::default()
        };
        Ok(base.merge(&flags))
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script to run, resolved against --script-path.
    pub script: String,
    /// Arguments passed to the script.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Message to send before closing stdin (repeatable).
    #[arg(long, value_name = "MESSAGE")]
    pub send: Vec<String>,
    #[command(flatten)]
    pub interpreter: InterpreterArgs,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Code to run.
    pub code: String,
    /// Arguments available as sys.argv[1:].
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Message to send before closing stdin (repeatable).
    #[arg(long, value_name = "MESSAGE")]
    pub send: Vec<String>,
    #[command(flatten)]
    pub interpreter: InterpreterArgs,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["code", "file"])))]
pub struct CheckArgs {
    /// Code to check.
    pub code: Option<String>,
    /// File to check instead of inline code.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub interpreter: InterpreterArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
    #[command(flatten)]
    pub interpreter: InterpreterArgs,
}
