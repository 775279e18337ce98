#![cfg(unix)]

use std::process::{Command, Stdio};

use pyshell_channel::{
    check_syntax, check_syntax_file, interpreter_version, run, run_string, ChannelError,
    ChannelOptions, Message, Mode, SyntaxCheckError, DEFAULT_PYTHON,
};
use serde_json::json;

fn sh() -> ChannelOptions {
    ChannelOptions::new().with_python_path("sh")
}

fn python_available() -> bool {
    Command::new(DEFAULT_PYTHON)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("skipping: {DEFAULT_PYTHON} not found");
            return;
        }
    };
}

#[tokio::test]
async fn run_collects_every_message() {
    let output = run("-c", sh().with_args(["echo a; echo b; echo warn >&2"])).await;
    assert!(output.is_success(), "{:?}", output.error);
    assert_eq!(output.messages, vec![Message::from("a"), Message::from("b")]);
    assert_eq!(output.stderr, vec![Message::from("warn")]);
    assert!(output.exit.success());
}

#[tokio::test]
async fn run_decodes_json() {
    let output = run(
        "-c",
        sh().with_mode(Mode::Json)
            .with_args([r#"echo '{"a":"b"}'; echo null"#]),
    )
    .await;
    assert_eq!(
        output.into_result().unwrap(),
        vec![Message::Json(json!({"a": "b"})), Message::Json(json!(null))]
    );
}

#[tokio::test]
async fn run_keeps_messages_from_a_failed_script() {
    let output = run("-c", sh().with_args(["echo partial; exit 4"])).await;
    assert_eq!(output.messages, vec![Message::from("partial")]);
    assert_eq!(output.exit.code, Some(4));
    let err = output.error.expect("failure");
    assert_eq!(err.script_error().unwrap().exit_code(), Some(4));
}

#[tokio::test]
async fn run_with_missing_interpreter_reports_spawn_error() {
    let output = run(
        "script.py",
        ChannelOptions::new().with_python_path("/nonexistent/bad_python"),
    )
    .await;
    assert!(output.messages.is_empty());
    assert!(matches!(output.error, Some(ChannelError::Spawn { .. })));
}

#[tokio::test]
async fn run_string_passes_code_before_args() {
    let output = run_string("echo \"$0 $1\"", sh().with_args(["first", "second"])).await;
    assert_eq!(
        output.into_result().unwrap(),
        vec![Message::from("first second")]
    );
}

#[tokio::test]
async fn version_comes_from_the_interpreter() {
    let options = sh().with_python_options(["-c", "echo 'Python 3.99.1'", "sh"]);
    assert_eq!(interpreter_version(&options).await.unwrap(), "Python 3.99.1");
}

#[tokio::test]
async fn python_run_string_prints() {
    require_python!();
    let output = run_string("print('hello world!')", ChannelOptions::new()).await;
    assert_eq!(
        output.into_result().unwrap(),
        vec![Message::from("hello world!")]
    );
}

#[tokio::test]
async fn python_exception_is_translated() {
    require_python!();
    let code = "def divide_by_zero():\n    return 1 / 0\n\ndivide_by_zero()\n";
    let output = run_string(code, ChannelOptions::new()).await;
    let err = output.error.expect("script should fail");
    let script_error = err.script_error().expect("script error");
    assert_eq!(script_error.message(), "ZeroDivisionError: division by zero");
    assert_eq!(script_error.exit_code(), Some(1));
    assert!(script_error.traceback().unwrap().contains("divide_by_zero"));
}

#[tokio::test]
async fn python_echoes_json_from_stdin() {
    require_python!();
    let code = "import sys, json\nfor line in sys.stdin:\n    print(json.dumps(json.loads(line)))\n";
    let mut channel = pyshell_channel::ProcessChannel::spawn(
        "-c",
        ChannelOptions::new()
            .with_mode(Mode::Json)
            .with_args([code]),
    );
    channel.send(json!({"a": "b"})).unwrap();
    channel.send(json!([1, 2, 3])).unwrap();
    channel.end_input();

    let mut received = Vec::new();
    while let Some(event) = channel.next_event().await {
        if let pyshell_channel::ChannelEvent::Message(message) = event {
            received.push(message);
        }
    }
    assert_eq!(
        received,
        vec![Message::Json(json!({"a": "b"})), Message::Json(json!([1, 2, 3]))]
    );
}

#[tokio::test]
async fn python_check_syntax() {
    require_python!();
    check_syntax("x = 1", ChannelOptions::new())
        .await
        .expect("valid code");

    let err = check_syntax("x =", ChannelOptions::new())
        .await
        .unwrap_err();
    match &err {
        SyntaxCheckError::Invalid { summary, .. } => {
            assert!(summary.starts_with("SyntaxError"), "{summary}");
        }
        other => panic!("expected invalid syntax, got {other:?}"),
    }
    assert!(err.diagnostics().unwrap().contains("SyntaxError"));
}

#[tokio::test]
async fn python_check_syntax_file() {
    require_python!();
    let dir = std::env::temp_dir().join(format!("pyshell-syntax-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let good = dir.join("good.py");
    let bad = dir.join("bad.py");
    std::fs::write(&good, "x = 1\n").unwrap();
    std::fs::write(&bad, "def f(:\n    pass\n").unwrap();

    check_syntax_file(&good, ChannelOptions::new())
        .await
        .expect("valid file");
    let err = check_syntax_file(&bad, ChannelOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyntaxCheckError::Invalid { .. }));

    let _ = std::fs::remove_dir_all(&dir);
}
