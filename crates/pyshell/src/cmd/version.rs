use pyshell_channel::interpreter_version_blocking;
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    interpreter: String,
    interpreter_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildInfo>,
}

#[derive(Serialize)]
struct BuildInfo {
    target: &'static str,
    profile: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    features: Vec<&'static str>,
}

/// Prints pyshell's version and probes the configured interpreter.
///
/// A missing interpreter is reported, not treated as a failure.
pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let options = args.interpreter.options()?;
    let interpreter_version = match interpreter_version_blocking(&options) {
        Ok(version) => Some(version),
        Err(err) => {
            tracing::warn!(error = %err, "interpreter version probe failed");
            None
        }
    };

    let output = VersionOutput {
        name: "pyshell",
        version: env!("CARGO_PKG_VERSION"),
        interpreter: options.interpreter().display().to_string(),
        interpreter_version,
        build: args.extended.then(build_info),
    };

    let mut fields = vec![
        ("version", format!("pyshell {}", output.version)),
        (
            "interpreter",
            format!(
                "{} ({})",
                output.interpreter,
                output
                    .interpreter_version
                    .as_deref()
                    .unwrap_or("unavailable")
            ),
        ),
    ];
    if let Some(build) = &output.build {
        fields.push(("target", build.target.to_string()));
        fields.push(("profile", build.profile.to_string()));
        fields.push(("target_os", build.target_os.to_string()));
        fields.push(("target_arch", build.target_arch.to_string()));
        fields.push(("rustc", build.rustc.to_string()));
        fields.push(("git_hash", build.git_hash.to_string()));
        fields.push(("features", build.features.join(", ")));
    }
    print_record(&output, &fields, format);

    Ok(SUCCESS)
}

fn build_info() -> BuildInfo {
    let mut features = vec!["cli"];
    if cfg!(feature = "channel") {
        features.push("channel");
    }
    if cfg!(feature = "async") {
        features.push("async");
    }
    BuildInfo {
        target: option_env!("PYSHELL_BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("PYSHELL_BUILD_PROFILE").unwrap_or("unknown"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        rustc: option_env!("PYSHELL_RUSTC_VERSION").unwrap_or("unknown"),
        git_hash: option_env!("PYSHELL_GIT_HASH").unwrap_or("unknown"),
        features,
    }
}
