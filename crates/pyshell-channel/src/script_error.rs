use std::fmt;

use pyshell_process::Signal;

use crate::options::ChannelOptions;

/// First line of a Python traceback on stderr.
pub const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

/// Separator between the summary and the traceback in [`ScriptError`]'s
/// display form.
pub const TRACEBACK_SEPARATOR: &str = "----- Python Traceback -----";

/// A failed script run, with the remote traceback when one was printed.
///
/// Displays as the summary line, then the traceback under a separator:
///
/// ```text
/// ZeroDivisionError: division by zero
///
/// ----- Python Traceback -----
///
/// Traceback (most recent call last):
///   File "error.py", line 4, in <module>
///     divide_by_zero()
/// ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub(crate) message: String,
    pub(crate) exit_code: Option<i32>,
    pub(crate) exit_signal: Option<Signal>,
    pub(crate) script: String,
    pub(crate) args: Vec<String>,
    pub(crate) options: ChannelOptions,
    pub(crate) stderr: String,
    pub(crate) traceback: Option<String>,
}

impl ScriptError {
    /// Summary line, usually the exception (`ValueError: bad input`).
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn exit_signal(&self) -> Option<Signal> {
        self.exit_signal
    }

    /// Script as it was passed to the interpreter.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Arguments given to the script.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Options the channel ran with.
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Everything the child wrote to stderr.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Traceback text, from the header to the end of stderr.
    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }

    pub fn has_traceback(&self) -> bool {
        self.traceback.is_some()
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(traceback) = &self.traceback {
            write!(f, "\n\n{TRACEBACK_SEPARATOR}\n\n{traceback}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptError {}
