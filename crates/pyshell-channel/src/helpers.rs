//! One-shot helpers built on [`ProcessChannel`].

use std::path::Path;

use pyshell_codec::Message;
use pyshell_process::{ExitInfo, LaunchSpec, StdioConfig, StdioMode};
use tracing::debug;

use crate::channel::{ChannelCodecs, ProcessChannel};
use crate::error::{ChannelError, Result};
use crate::event::{ChannelEvent, ErrorSlot};
use crate::options::ChannelOptions;
use crate::translate::{translate, ScriptContext};

/// Interpreter flag that runs its argument as code.
const CODE_FLAG: &str = "-c";

/// Interpreter flag that runs a module.
const MODULE_FLAG: &str = "-m";

/// Compiles `sys.argv[1]` without running it.
const COMPILE_CHECK: &str = "import sys; compile(sys.argv[1], '<string>', 'exec')";

/// Everything a finished one-shot run produced.
#[derive(Debug, Default)]
pub struct RunOutput {
    /// Decoded stdout messages, in order.
    pub messages: Vec<Message>,
    /// Decoded stderr messages, in order.
    pub stderr: Vec<Message>,
    pub exit: ExitInfo,
    /// A spawn failure, else the script failure, else the first other error.
    pub error: Option<ChannelError>,
}

impl RunOutput {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The messages, or the error if the run failed.
    pub fn into_result(self) -> Result<Vec<Message>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.messages),
        }
    }
}

/// Run `script` to completion with stdin closed and collect its output.
pub async fn run(script: impl Into<String>, options: ChannelOptions) -> RunOutput {
    collect(ProcessChannel::spawn(script, options)).await
}

/// [`run`] with caller-supplied codecs.
pub async fn run_with_codecs(
    script: impl Into<String>,
    options: ChannelOptions,
    codecs: ChannelCodecs,
) -> RunOutput {
    collect(ProcessChannel::spawn_with_codecs(script, options, codecs)).await
}

/// Run a code string (`python -c code args...`).
pub async fn run_string(code: impl Into<String>, options: ChannelOptions) -> RunOutput {
    run(CODE_FLAG, prepend_args(options, [code.into()])).await
}

/// Check that `code` compiles, without running it.
pub async fn check_syntax(
    code: impl Into<String>,
    options: ChannelOptions,
) -> std::result::Result<(), SyntaxCheckError> {
    let output = run_string(COMPILE_CHECK, prepend_args(options, [code.into()])).await;
    syntax_result(output)
}

/// Check that the file at `path` compiles, without running it.
pub async fn check_syntax_file(
    path: impl AsRef<Path>,
    options: ChannelOptions,
) -> std::result::Result<(), SyntaxCheckError> {
    let path = path.as_ref().to_string_lossy().into_owned();
    let options = prepend_args(options, ["py_compile".to_string(), path]);
    syntax_result(run(MODULE_FLAG, options).await)
}

/// Version banner of the configured interpreter, e.g. `Python 3.12.1`.
pub async fn interpreter_version(options: &ChannelOptions) -> Result<String> {
    let output = version_probe(options)
        .command()
        .output()
        .await
        .map_err(|source| ChannelError::Spawn {
            program: options.interpreter(),
            source,
        })?;
    version_text(output, options)
}

/// Blocking form of [`interpreter_version`], for use outside a runtime.
pub fn interpreter_version_blocking(options: &ChannelOptions) -> Result<String> {
    let output = version_probe(options)
        .std_command()
        .output()
        .map_err(|source| ChannelError::Spawn {
            program: options.interpreter(),
            source,
        })?;
    version_text(output, options)
}

/// A failed syntax check.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxCheckError {
    /// The code does not compile.
    #[error("{summary}")]
    Invalid {
        /// The exception line, e.g. `SyntaxError: invalid syntax`.
        summary: String,
        /// The interpreter's full report.
        diagnostics: String,
    },

    /// The check itself could not run.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl SyntaxCheckError {
    /// Interpreter report for invalid code.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            SyntaxCheckError::Invalid { diagnostics, .. } => Some(diagnostics),
            SyntaxCheckError::Channel(_) => None,
        }
    }
}

async fn collect(mut channel: ProcessChannel) -> RunOutput {
    channel.end_input();
    let mut output = RunOutput::default();
    let mut errors = ErrorSlot::default();

    while let Some(event) = channel.next_event().await {
        match event {
            ChannelEvent::Message(message) => output.messages.push(message),
            ChannelEvent::Stderr(message) => output.stderr.push(message),
            ChannelEvent::Error(err) => errors.offer(err),
            ChannelEvent::ScriptError(err) => errors.offer(ChannelError::Script(err)),
            ChannelEvent::Close(exit) => output.exit = exit,
        }
    }

    output.error = errors.take();
    debug!(
        script = %channel.script(),
        messages = output.messages.len(),
        exit = %output.exit,
        failed = output.error.is_some(),
        "run finished"
    );
    output
}

fn prepend_args<I>(mut options: ChannelOptions, leading: I) -> ChannelOptions
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = leading.into_iter().collect();
    args.extend(options.args.take().unwrap_or_default());
    options.args = Some(args);
    options
}

fn syntax_result(output: RunOutput) -> std::result::Result<(), SyntaxCheckError> {
    match output.error {
        None => Ok(()),
        Some(ChannelError::Script(err)) => Err(SyntaxCheckError::Invalid {
            summary: err.message().to_string(),
            diagnostics: err.stderr().trim_end().to_string(),
        }),
        Some(err) => Err(err.into()),
    }
}

fn version_probe(options: &ChannelOptions) -> LaunchSpec {
    let mut spec = LaunchSpec::new(options.interpreter())
        .args(options.python_options.clone().unwrap_or_default())
        .arg("--version")
        .envs(options.env.clone().unwrap_or_default())
        .stdio(StdioConfig {
            stdin: StdioMode::Null,
            stdout: StdioMode::Piped,
            stderr: StdioMode::Piped,
        });
    if let Some(cwd) = &options.cwd {
        spec = spec.current_dir(cwd);
    }
    spec
}

fn version_text(output: std::process::Output, options: &ChannelOptions) -> Result<String> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let context = ScriptContext {
        script: "--version".to_string(),
        args: Vec::new(),
        options: options.clone(),
    };
    if let Some(err) = translate(&ExitInfo::from(output.status), &stderr, &context) {
        return Err(err.into());
    }

    // Older interpreters print the banner on stderr.
    let banner = if output.stdout.trim_ascii().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(output.stdout.trim_ascii()).into_owned()
    };
    Ok(banner)
}
