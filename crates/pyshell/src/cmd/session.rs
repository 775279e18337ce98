use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pyshell_channel::{
    ChannelError, ChannelEvent, ChannelOptions, KillHandle, Message, Mode, ProcessChannel,
    StreamKind,
};
use tracing::warn;

use crate::exit::{
    channel_error, io_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS, USAGE,
};
use crate::output::{OutputFormat, Printer};

pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

/// Spawn `script`, send `messages`, close stdin and print every event until
/// the channel closes.
pub fn drive(
    script: String,
    options: ChannelOptions,
    messages: Vec<String>,
    format: OutputFormat,
) -> CliResult<i32> {
    let mode = options.effective_mode();
    let outgoing = messages
        .into_iter()
        .map(|text| outgoing_message(mode, text))
        .collect::<CliResult<Vec<_>>>()?;

    runtime()?.block_on(async move {
        let mut channel = ProcessChannel::spawn(script, options);
        let interrupted = Arc::new(AtomicBool::new(false));
        install_ctrlc_handler(channel.kill_handle(), Arc::clone(&interrupted))?;

        for message in outgoing {
            if let Err(err) = channel.send(message) {
                // A failed spawn or an early exit surfaces through the events below.
                warn!(error = %err, "message not sent");
                break;
            }
        }
        channel.end_input();

        let mut printer = Printer::new(format);
        let mut script_error = None;
        let mut first_error = None;
        while let Some(event) = channel.next_event().await {
            match event {
                ChannelEvent::Message(message) => printer.message(StreamKind::Stdout, &message),
                ChannelEvent::Stderr(message) => printer.message(StreamKind::Stderr, &message),
                ChannelEvent::Error(err) => {
                    warn!(error = %err, "channel error");
                    first_error.get_or_insert(err);
                }
                ChannelEvent::ScriptError(err) => script_error = Some(ChannelError::Script(err)),
                ChannelEvent::Close(exit) => printer.close(&exit),
            }
        }

        if interrupted.load(Ordering::SeqCst) {
            return Err(CliError::new(INTERRUPTED, "interrupted"));
        }
        match script_error.or(first_error) {
            Some(err) => Err(channel_error("run failed", err)),
            None => Ok(SUCCESS),
        }
    })
}

/// JSON mode sends each argument as a JSON document; other modes send text.
fn outgoing_message(mode: Mode, text: String) -> CliResult<Message> {
    match mode {
        Mode::Json => serde_json::from_str(&text).map(Message::Json).map_err(|err| {
            CliError::new(USAGE, format!("--send {text:?} is not valid JSON: {err}"))
        }),
        Mode::Text | Mode::Binary => Ok(Message::Text(text)),
    }
}

fn install_ctrlc_handler(killer: KillHandle, interrupted: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
        killer.kill(None);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
