use std::process::Command;

fn main() {
    for (var, exported) in [
        ("TARGET", "PYSHELL_BUILD_TARGET"),
        ("PROFILE", "PYSHELL_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Some(version) = first_line(Command::new(rustc).arg("--version")) {
        println!("cargo:rustc-env=PYSHELL_RUSTC_VERSION={version}");
    }
    // Absent outside a git checkout.
    if let Some(hash) = first_line(Command::new("git").args(["rev-parse", "--short", "HEAD"])) {
        println!("cargo:rustc-env=PYSHELL_GIT_HASH={hash}");
    }
}

fn first_line(command: &mut Command) -> Option<String> {
    let output = command.output().ok().filter(|output| output.status.success())?;
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}
