use pyshell_process::ExitInfo;

use crate::options::ChannelOptions;
use crate::script_error::{ScriptError, TRACEBACK_HEADER};

/// Last segment suffixes that mark a line as an exception summary.
const EXCEPTION_SUFFIXES: &[&str] = &["Error", "Exception", "Exit", "Interrupt", "Warning"];

/// Builtin exceptions whose names carry none of the usual suffixes.
const BARE_EXCEPTIONS: &[&str] = &["StopIteration", "StopAsyncIteration"];

/// What was run, attached to any resulting [`ScriptError`].
#[derive(Debug, Clone, Default)]
pub struct ScriptContext {
    pub script: String,
    pub args: Vec<String>,
    pub options: ChannelOptions,
}

/// Decide whether a finished run failed, and describe the failure.
///
/// A run fails when it exited with a non-zero code or when stderr contains a
/// traceback. Stderr without a traceback from a successful run is output, not
/// an error. A process killed by a signal has no exit code, so it only fails
/// if it also printed a traceback.
pub fn translate(exit: &ExitInfo, stderr: &str, context: &ScriptContext) -> Option<ScriptError> {
    let traceback = extract_traceback(stderr);
    let failed = matches!(exit.code, Some(code) if code != 0);
    if !failed && traceback.is_none() {
        return None;
    }

    let message = match exception_summary(stderr) {
        Some(line) => line.to_string(),
        None => match (exit.code, exit.signal) {
            (Some(code), _) => format!("process exited with code {code}"),
            (None, Some(signal)) => format!("process terminated by {signal}"),
            (None, None) => "process failed".to_string(),
        },
    };

    Some(ScriptError {
        message,
        exit_code: exit.code,
        exit_signal: exit.signal,
        script: context.script.clone(),
        args: context.args.clone(),
        options: context.options.clone(),
        stderr: stderr.to_string(),
        traceback: traceback.map(str::to_string),
    })
}

/// Stderr from the first traceback header to the end, trailing space trimmed.
fn extract_traceback(stderr: &str) -> Option<&str> {
    stderr
        .match_indices(TRACEBACK_HEADER)
        .map(|(start, _)| start)
        .find(|&start| start == 0 || stderr[..start].ends_with('\n'))
        .map(|start| stderr[start..].trim_end())
}

/// Last non-empty stderr line, if it names an exception.
fn exception_summary(stderr: &str) -> Option<&str> {
    let line = stderr
        .lines()
        .map(str::trim_end)
        .rev()
        .find(|line| !line.is_empty())?;
    looks_like_exception(line).then_some(line)
}

fn looks_like_exception(line: &str) -> bool {
    let name = line.split_once(':').map_or(line, |(name, _)| name);
    let is_ident = |segment: &str| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_')
    };
    if !name.split('.').all(is_ident) {
        return false;
    }
    let last = name.rsplit('.').next().unwrap_or(name);
    EXCEPTION_SUFFIXES.iter().any(|suffix| last.ends_with(suffix))
        || BARE_EXCEPTIONS.contains(&last)
}

#[cfg(test)]
mod tests {
    use pyshell_process::Signal;

    use super::*;
    use crate::script_error::TRACEBACK_SEPARATOR;

    const ZERO_DIVISION: &str = "Traceback (most recent call last):\n  File \"error.py\", line 4, in <module>\n    divide_by_zero()\n  File \"error.py\", line 2, in divide_by_zero\n    return 1 / 0\nZeroDivisionError: division by zero\n";

    fn context() -> ScriptContext {
        ScriptContext {
            script: "error.py".into(),
            args: vec!["a".into()],
            options: ChannelOptions::new().with_python_path("python3"),
        }
    }

    #[test]
    fn clean_exit_is_not_an_error() {
        assert!(translate(&ExitInfo::with_code(0), "", &context()).is_none());
    }

    #[test]
    fn warnings_on_a_clean_exit_are_not_an_error() {
        let stderr = "INFO:root:Jackdaws love my big sphinx of quartz.\nerror.py:3: DeprecationWarning: old\n";
        assert!(translate(&ExitInfo::with_code(0), stderr, &context()).is_none());
    }

    #[test]
    fn traceback_becomes_script_error() {
        let err = translate(&ExitInfo::with_code(1), ZERO_DIVISION, &context()).unwrap();
        assert_eq!(err.message(), "ZeroDivisionError: division by zero");
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.script(), "error.py");
        assert_eq!(err.args(), ["a".to_string()]);
        assert_eq!(err.options().python_path.as_deref(), Some(std::path::Path::new("python3")));
        assert_eq!(err.stderr(), ZERO_DIVISION);
        assert!(err.has_traceback());
        assert!(err.traceback().unwrap().starts_with(TRACEBACK_HEADER));
        assert!(err.traceback().unwrap().ends_with("ZeroDivisionError: division by zero"));
    }

    #[test]
    fn display_appends_traceback_under_separator() {
        let err = translate(&ExitInfo::with_code(1), ZERO_DIVISION, &context()).unwrap();
        let rendered = err.to_string();
        let expected_prefix =
            format!("ZeroDivisionError: division by zero\n\n{TRACEBACK_SEPARATOR}\n\n{TRACEBACK_HEADER}\n");
        assert!(rendered.starts_with(&expected_prefix), "{rendered}");
        assert!(rendered.contains("divide_by_zero()"));
    }

    #[test]
    fn traceback_after_other_output_is_found() {
        let stderr = format!("starting up\n{ZERO_DIVISION}");
        let err = translate(&ExitInfo::with_code(1), &stderr, &context()).unwrap();
        assert!(err.traceback().unwrap().starts_with(TRACEBACK_HEADER));
        assert_eq!(err.stderr(), stderr);
    }

    #[test]
    fn traceback_on_a_clean_exit_is_still_an_error() {
        let err = translate(&ExitInfo::with_code(0), ZERO_DIVISION, &context()).unwrap();
        assert_eq!(err.exit_code(), Some(0));
        assert!(err.has_traceback());
    }

    #[test]
    fn failure_without_traceback_uses_exit_code() {
        let err = translate(&ExitInfo::with_code(2), "usage: tool [-h]\n", &context()).unwrap();
        assert_eq!(err.message(), "process exited with code 2");
        assert!(!err.has_traceback());
        assert_eq!(err.to_string(), "process exited with code 2");
    }

    #[test]
    fn bare_exception_line_is_a_summary() {
        let stderr =
            format!("{TRACEBACK_HEADER}\n  File \"x.py\", line 1, in <module>\nKeyboardInterrupt\n");
        let err = translate(&ExitInfo::with_code(130), &stderr, &context()).unwrap();
        assert_eq!(err.message(), "KeyboardInterrupt");
    }

    #[test]
    fn dotted_exception_names_are_summaries() {
        let stderr = format!("{TRACEBACK_HEADER}\nmyapp.errors.ConfigError: missing key 'x'\n");
        let err = translate(&ExitInfo::with_code(1), &stderr, &context()).unwrap();
        assert_eq!(err.message(), "myapp.errors.ConfigError: missing key 'x'");
    }

    #[test]
    fn indented_header_is_not_a_traceback() {
        let stderr = "  Traceback (most recent call last): quoted\n";
        assert!(translate(&ExitInfo::with_code(0), stderr, &context()).is_none());
    }

    #[test]
    fn signal_kill_without_traceback_is_not_an_error() {
        let exit = ExitInfo::with_signal(Signal::Term);
        assert!(translate(&exit, "partial output\n", &context()).is_none());
    }

    #[test]
    fn signal_kill_with_traceback_is_an_error() {
        let exit = ExitInfo::with_signal(Signal::Term);
        let err = translate(&exit, ZERO_DIVISION, &context()).unwrap();
        assert_eq!(err.exit_code(), None);
        assert_eq!(err.exit_signal(), Some(Signal::Term));
    }

    #[test]
    fn summary_detection() {
        assert!(looks_like_exception("ValueError: bad"));
        assert!(looks_like_exception("SystemExit: 3"));
        assert!(looks_like_exception("StopIteration"));
        assert!(looks_like_exception("UserWarning: careful"));
        assert!(!looks_like_exception("INFO:root:hello"));
        assert!(!looks_like_exception("    raise ValueError('bad')"));
        assert!(!looks_like_exception("some Error: here"));
        assert!(!looks_like_exception(""));
    }
}
