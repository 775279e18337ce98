#![cfg(unix)]

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use pyshell_channel::{
    ChannelCodecs, ChannelError, ChannelEvent, ChannelOptions, ChannelState, CodecError, Message,
    Mode, ProcessChannel, Signal, StdioConfig, StdioMode, StreamKind, TRACEBACK_HEADER,
};
use serde_json::json;

const TRACEBACK: &str = r#"printf 'Traceback (most recent call last):\n  File "error.py", line 4, in <module>\n    divide_by_zero()\nZeroDivisionError: division by zero\n' >&2"#;

/// Options that run `code` through `sh -c` in place of a Python script.
fn shell(code: &str) -> ChannelOptions {
    ChannelOptions::new()
        .with_python_path("sh")
        .with_args([code])
}

fn spawn_shell(code: &str, options: ChannelOptions) -> ProcessChannel {
    ProcessChannel::spawn("-c", shell(code).merge(&options))
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("channel should finish in time")
}

/// Close stdin and take every event until the channel closes.
async fn drain(channel: &mut ProcessChannel) -> Vec<ChannelEvent> {
    channel.end_input();
    within(async {
        let mut events = Vec::new();
        while let Some(event) = channel.next_event().await {
            events.push(event);
        }
        events
    })
    .await
}

fn messages(events: &[ChannelEvent]) -> Vec<Message> {
    events
        .iter()
        .filter_map(|event| match event {
            ChannelEvent::Message(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn stderr_messages(events: &[ChannelEvent]) -> Vec<Message> {
    events
        .iter()
        .filter_map(|event| match event {
            ChannelEvent::Stderr(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/pyshell-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

#[tokio::test]
async fn spawns_and_closes_cleanly() {
    let mut channel = spawn_shell("exit 0", ChannelOptions::new());
    assert!(channel.pid().is_some());
    assert_eq!(channel.program(), std::path::Path::new("sh"));
    assert_eq!(channel.command(), ["-c".to_string(), "exit 0".into()]);
    assert_eq!(channel.args(), ["exit 0".to_string()]);

    let closes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closes);
    channel.on_close(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let exit = within(channel.end()).await.expect("clean exit");
    assert_eq!(exit.code, Some(0));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_interpreter_reports_spawn_error_then_close() {
    let mut channel = ProcessChannel::spawn(
        "script.py",
        ChannelOptions::new().with_python_path("/nonexistent/bad_python"),
    );
    assert!(channel.is_terminated());
    assert!(channel.pid().is_none());

    let events = drain(&mut channel).await;
    assert_eq!(events.len(), 2);
    match &events[0] {
        ChannelEvent::Error(err @ ChannelError::Spawn { .. }) => {
            assert_eq!(err.os_code(), Some(2));
        }
        other => panic!("expected spawn error, got {other:?}"),
    }
    assert!(matches!(events[1], ChannelEvent::Close(_)));
    assert!(channel.next_event().await.is_none());
    assert!(matches!(
        channel.send("hello"),
        Err(ChannelError::Terminated)
    ));
}

#[tokio::test]
async fn end_returns_spawn_error() {
    let channel = ProcessChannel::spawn(
        "script.py",
        ChannelOptions::new().with_python_path("/nonexistent/bad_python"),
    );
    let err = within(channel.end()).await.unwrap_err();
    assert!(matches!(err, ChannelError::Spawn { .. }));
}

#[tokio::test]
async fn echoes_text_lines() {
    let mut channel = spawn_shell("cat", ChannelOptions::new());
    channel.send("hello").unwrap().send("world").unwrap();

    let events = drain(&mut channel).await;
    assert_eq!(
        messages(&events),
        vec![Message::from("hello"), Message::from("world")]
    );
    assert!(matches!(events.last(), Some(ChannelEvent::Close(exit)) if exit.success()));
}

#[tokio::test]
async fn listeners_see_messages_before_close() {
    let mut channel = spawn_shell("cat", ChannelOptions::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    channel.on_message(move |message| sink.lock().unwrap().push(message.to_string()));
    let sink = Arc::clone(&seen);
    channel.on_close(move |exit| sink.lock().unwrap().push(format!("close: {exit}")));

    channel.send("hello").unwrap().send("world").unwrap();
    within(channel.end()).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["hello", "world", "close: exit code 0"]
    );
}

#[tokio::test]
async fn preserves_send_order() {
    let mut channel = spawn_shell("cat", ChannelOptions::new());
    for i in 0..200 {
        channel.send(format!("line {i}")).unwrap();
    }
    let events = drain(&mut channel).await;
    let expected: Vec<Message> = (0..200).map(|i| Message::from(format!("line {i}"))).collect();
    assert_eq!(messages(&events), expected);
}

#[tokio::test]
async fn json_values_round_trip_through_the_child() {
    let mut channel = spawn_shell("cat", ChannelOptions::new().with_mode(Mode::Json));
    let values = [json!({"a": "b"}), json!(null), json!([1, 2, 3])];
    for value in &values {
        channel.send(value.clone()).unwrap();
    }

    let events = drain(&mut channel).await;
    let expected: Vec<Message> = values.into_iter().map(Message::Json).collect();
    assert_eq!(messages(&events), expected);
}

#[tokio::test]
async fn partial_json_is_buffered_across_writes() {
    let mut channel = spawn_shell(
        r#"printf '{"a"'; sleep 0.1; printf ':true}\n'"#,
        ChannelOptions::new().with_mode(Mode::Json),
    );
    let events = drain(&mut channel).await;
    assert_eq!(messages(&events), vec![Message::Json(json!({"a": true}))]);
}

#[tokio::test]
async fn custom_terminator_splits_output_and_terminates_input() {
    let mut channel = spawn_shell(
        "printf 'hello$world$'; cat",
        ChannelOptions::new().with_terminator("$"),
    );
    channel.send("echoed").unwrap();

    let events = drain(&mut channel).await;
    assert_eq!(
        messages(&events),
        vec![
            Message::from("hello"),
            Message::from("world"),
            Message::from("echoed"),
        ]
    );
}

#[tokio::test]
async fn unterminated_tail_is_flushed_at_close() {
    let mut channel = spawn_shell("printf 'one\\ntwo'", ChannelOptions::new());
    let events = drain(&mut channel).await;
    assert_eq!(messages(&events), vec![Message::from("one"), Message::from("two")]);
}

#[tokio::test]
async fn binary_mode_passes_bytes_verbatim() {
    let mut channel = spawn_shell("cat", ChannelOptions::new().with_mode(Mode::Binary));
    channel
        .send(Bytes::from_static(b"i am not a string\n"))
        .unwrap();

    let events = drain(&mut channel).await;
    let received: Vec<u8> = messages(&events)
        .iter()
        .flat_map(|message| message.as_binary().expect("binary message").to_vec())
        .collect();
    assert_eq!(received, b"i am not a string\n");
}

#[tokio::test]
async fn custom_codecs_replace_each_direction() {
    let options = shell("cat").with_mode(Mode::Text);
    let codecs = ChannelCodecs::from_options(&options)
        .with_serializer(|message: &Message| -> Result<Bytes, CodecError> {
            Ok(Bytes::from(format!("<{message}>")))
        })
        .with_parser(|frame: Bytes| -> Result<Message, CodecError> {
            Ok(Message::Text(String::from_utf8_lossy(&frame).to_uppercase()))
        });
    let mut channel = ProcessChannel::spawn_with_codecs("-c", options, codecs);
    channel.send("hello").unwrap();

    let events = drain(&mut channel).await;
    assert_eq!(messages(&events), vec![Message::from("<HELLO>")]);
}

#[tokio::test]
async fn stderr_lines_are_events_not_errors() {
    let mut channel = spawn_shell(
        "echo 'INFO:root:Jackdaws love my big sphinx of quartz.' >&2; echo done",
        ChannelOptions::new(),
    );
    let events = drain(&mut channel).await;
    assert_eq!(
        stderr_messages(&events),
        vec![Message::from("INFO:root:Jackdaws love my big sphinx of quartz.")]
    );
    assert_eq!(messages(&events), vec![Message::from("done")]);
    assert!(!events
        .iter()
        .any(|event| matches!(event, ChannelEvent::Error(_) | ChannelEvent::ScriptError(_))));
    assert!(matches!(
        events.last(),
        Some(ChannelEvent::Close(exit)) if exit.code == Some(0)
    ));
}

#[tokio::test]
async fn stderr_parser_is_independent_of_stdout() {
    let options = shell("echo info >&2; echo info");
    let codecs = ChannelCodecs::from_options(&options).with_stderr_parser(
        |frame: Bytes| -> Result<Message, CodecError> {
            Ok(Message::Text(String::from_utf8_lossy(&frame).to_uppercase()))
        },
    );
    let mut channel = ProcessChannel::spawn_with_codecs("-c", options, codecs);

    let events = drain(&mut channel).await;
    assert_eq!(stderr_messages(&events), vec![Message::from("INFO")]);
    assert_eq!(messages(&events), vec![Message::from("info")]);
}

#[tokio::test]
async fn binary_stderr_mode_yields_raw_chunks() {
    let mut channel = spawn_shell(
        "printf 'i am not a string\\n' >&2",
        ChannelOptions::new().with_stderr_mode(Mode::Binary),
    );
    let events = drain(&mut channel).await;

    let mut raw = Vec::new();
    for message in stderr_messages(&events) {
        match message {
            Message::Binary(bytes) => raw.extend_from_slice(&bytes),
            other => panic!("expected binary stderr, got {other:?}"),
        }
    }
    assert_eq!(raw, b"i am not a string\n");
}

#[tokio::test]
async fn stderr_stays_text_in_json_mode() {
    let mut channel = spawn_shell(
        "echo 'not json' >&2",
        ChannelOptions::new().with_mode(Mode::Json),
    );
    let events = drain(&mut channel).await;
    assert_eq!(stderr_messages(&events), vec![Message::from("not json")]);
}

#[tokio::test]
async fn traceback_becomes_script_error() {
    let code = format!("echo partial; {TRACEBACK}; exit 1");
    let mut channel = spawn_shell(&code, ChannelOptions::new());
    let script_errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&script_errors);
    channel.on_script_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = within(channel.end()).await.unwrap_err();
    let script_error = err.script_error().expect("script error");
    assert_eq!(script_error.message(), "ZeroDivisionError: division by zero");
    assert_eq!(script_error.exit_code(), Some(1));
    assert_eq!(script_error.script(), "-c");
    assert!(script_error.traceback().unwrap().starts_with(TRACEBACK_HEADER));
    assert!(err.to_string().contains("----- Python Traceback -----"));
    assert_eq!(script_errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn script_error_arrives_after_output_and_before_close() {
    let code = format!("echo partial; {TRACEBACK}; exit 1");
    let mut channel = spawn_shell(&code, ChannelOptions::new());
    let events = drain(&mut channel).await;

    let kinds: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            ChannelEvent::Message(_) => Some("message"),
            ChannelEvent::ScriptError(_) => Some("script_error"),
            ChannelEvent::Close(_) => Some("close"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec!["message", "script_error", "close"]);
    assert_eq!(channel.exit_code(), Some(1));
}

#[tokio::test]
async fn nonzero_exit_without_traceback_is_an_error() {
    let channel = spawn_shell("exit 3", ChannelOptions::new());
    let err = within(channel.end()).await.unwrap_err();
    let script_error = err.script_error().expect("script error");
    assert_eq!(script_error.message(), "process exited with code 3");
    assert!(!script_error.has_traceback());
}

#[tokio::test]
async fn interpreter_options_come_before_the_script() {
    let channel = ProcessChannel::spawn(
        "-c",
        shell("false; echo unreachable").with_python_options(["-e"]),
    );
    assert_eq!(
        channel.command(),
        ["-e".to_string(), "-c".into(), "false; echo unreachable".into()]
    );
    let err = within(channel.end()).await.unwrap_err();
    assert_eq!(err.script_error().unwrap().exit_code(), Some(1));
}

#[tokio::test]
async fn script_is_resolved_against_script_path() {
    let dir = unique_temp_dir("script-path");
    std::fs::write(dir.join("hello.sh"), "echo \"from script: $1\"\n").unwrap();

    let mut channel = ProcessChannel::spawn(
        "hello.sh",
        ChannelOptions::new()
            .with_python_path("sh")
            .with_script_path(&dir)
            .with_args(["arg"]),
    );
    let events = drain(&mut channel).await;
    assert_eq!(messages(&events), vec![Message::from("from script: arg")]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn env_and_cwd_reach_the_child() {
    let dir = unique_temp_dir("cwd");
    let mut channel = spawn_shell(
        "echo \"$PYSHELL_TEST_VAR\"; pwd -P",
        ChannelOptions::new()
            .with_env("PYSHELL_TEST_VAR", "from env")
            .with_cwd(&dir),
    );
    let events = drain(&mut channel).await;
    let canonical = std::fs::canonicalize(&dir).unwrap();
    assert_eq!(
        messages(&events),
        vec![
            Message::from("from env"),
            Message::from(canonical.to_string_lossy().into_owned()),
        ]
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn malformed_json_is_reported_and_reading_continues() {
    let mut channel = spawn_shell(
        r#"echo '{bad'; echo '{"ok":1}'"#,
        ChannelOptions::new().with_mode(Mode::Json),
    );
    let events = drain(&mut channel).await;
    assert!(events.iter().any(|event| matches!(
        event,
        ChannelEvent::Error(ChannelError::Decode {
            stream: StreamKind::Stdout,
            ..
        })
    )));
    assert_eq!(messages(&events), vec![Message::Json(json!({"ok": 1}))]);
}

#[tokio::test]
async fn end_reports_decode_errors_only_without_an_error_listener() {
    let code = r#"echo '{bad'"#;
    let json = ChannelOptions::new().with_mode(Mode::Json);

    let channel = spawn_shell(code, json.clone());
    let err = within(channel.end()).await.unwrap_err();
    assert!(matches!(err, ChannelError::Decode { .. }));

    let mut channel = spawn_shell(code, json);
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    channel.on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let exit = within(channel.end()).await.expect("error was handled by the listener");
    assert!(exit.success());
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_frame_is_dropped_and_reading_continues() {
    let mut channel = spawn_shell(
        "printf 'toolong\\nok\\n'",
        ChannelOptions::new().with_max_frame_size(4),
    );
    let events = drain(&mut channel).await;
    assert!(events.iter().any(|event| matches!(
        event,
        ChannelEvent::Error(ChannelError::Frame {
            stream: StreamKind::Stdout,
            ..
        })
    )));
    assert_eq!(messages(&events), vec![Message::from("ok")]);
}

#[tokio::test]
async fn send_after_end_input_fails() {
    let mut channel = spawn_shell("cat", ChannelOptions::new());
    channel.end_input();
    assert_eq!(channel.state(), ChannelState::Ending);
    assert!(matches!(
        channel.send("late"),
        Err(ChannelError::StdinClosed)
    ));
    within(channel.end()).await.unwrap();
}

#[tokio::test]
async fn send_without_piped_stdin_fails() {
    let mut channel = spawn_shell(
        "echo ok",
        ChannelOptions::new().with_stdio(StdioConfig {
            stdin: StdioMode::Null,
            ..StdioConfig::piped()
        }),
    );
    assert!(matches!(
        channel.send("hello"),
        Err(ChannelError::StdinUnavailable)
    ));
    let events = drain(&mut channel).await;
    assert_eq!(messages(&events), vec![Message::from("ok")]);
}

#[tokio::test]
async fn json_mode_refuses_binary_messages() {
    let mut channel = spawn_shell("cat", ChannelOptions::new().with_mode(Mode::Json));
    assert!(matches!(
        channel.send(vec![0u8, 1]),
        Err(ChannelError::Encode(CodecError::Unsupported { .. }))
    ));
    within(channel.end()).await.unwrap();
}

#[tokio::test]
async fn kill_terminates_with_default_signal() {
    let mut channel = spawn_shell("exec sleep 10", ChannelOptions::new());
    assert_eq!(channel.state(), ChannelState::Running);

    assert!(channel.kill(None));
    assert!(channel.is_terminated());
    assert!(!channel.kill(None));
    assert!(matches!(
        channel.send("hello"),
        Err(ChannelError::Terminated)
    ));

    let events = drain(&mut channel).await;
    let closes = events
        .iter()
        .filter(|event| matches!(event, ChannelEvent::Close(_)))
        .count();
    assert_eq!(closes, 1);
    assert_eq!(channel.exit_signal(), Some(Signal::Term));
    assert_eq!(channel.exit_code(), None);
}

#[tokio::test]
async fn kill_accepts_a_signal_and_ends_without_error() {
    let channel = spawn_shell("exec sleep 10", ChannelOptions::new());
    let handle = channel.kill_handle();
    assert!(handle.kill(Some(Signal::Kill)));
    assert!(!channel.kill(None));

    let exit = within(channel.end()).await.expect("a killed child is not a script error");
    assert_eq!(exit.signal, Some(Signal::Kill));
}

#[tokio::test]
async fn kill_after_exit_is_a_no_op() {
    let mut channel = spawn_shell("exit 0", ChannelOptions::new());
    drain(&mut channel).await;
    assert!(channel.is_terminated());
    assert!(!channel.kill(None));
    assert_eq!(channel.exit_code(), Some(0));
}
