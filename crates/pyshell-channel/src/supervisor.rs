use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use pyshell_codec::Deserializer;
use pyshell_frame::{FrameCodec, FrameConfig, FrameError, Framer};
use pyshell_process::{ExitInfo, Signal};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::channel::{ChannelState, StateCell};
use crate::error::{ChannelError, StreamKind};
use crate::event::ChannelEvent;
use crate::translate::{translate, ScriptContext};

const STDERR_CHUNK_SIZE: usize = 8 * 1024;

/// One reading side of the child: its frame limits and message decoder.
pub(crate) struct Reader {
    pub(crate) config: FrameConfig,
    pub(crate) decoder: Arc<dyn Deserializer>,
}

/// Owns the child after spawn and produces every event after `Running`.
///
/// Stdout, stderr and the exit status are awaited together; only when all
/// three are done is the failure translated and `Close` sent. This is what
/// guarantees `Close` follows the last output event.
pub(crate) struct Supervisor {
    pub(crate) child: Child,
    pub(crate) stdout: Option<ChildStdout>,
    pub(crate) stderr: Option<ChildStderr>,
    pub(crate) stdout_reader: Reader,
    pub(crate) stderr_reader: Reader,
    pub(crate) kill_rx: UnboundedReceiver<Signal>,
    pub(crate) events: UnboundedSender<ChannelEvent>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) context: ScriptContext,
}

impl Supervisor {
    pub(crate) async fn run(self) {
        let Supervisor {
            child,
            stdout,
            stderr,
            stdout_reader,
            stderr_reader,
            kill_rx,
            events,
            state,
            context,
        } = self;
        let pid = child.id();

        let ((), stderr_text, exit) = tokio::join!(
            read_stdout(stdout, stdout_reader, &events),
            read_stderr(stderr, stderr_reader, &events),
            wait_for_exit(child, kill_rx),
        );
        state.advance(ChannelState::Terminated);

        let exit = match exit {
            Ok(exit) => exit,
            Err(source) => {
                warn!(?pid, error = %source, "failed to wait for child");
                emit(
                    &events,
                    ChannelEvent::Error(ChannelError::Io {
                        context: "failed to wait for child",
                        source,
                    }),
                );
                ExitInfo::default()
            }
        };
        info!(?pid, code = ?exit.code, signal = ?exit.signal, "child process exited");

        if let Some(err) = translate(&exit, &stderr_text, &context) {
            debug!(script = %context.script, message = %err.message(), "script failed");
            emit(&events, ChannelEvent::ScriptError(Box::new(err)));
        }
        emit(&events, ChannelEvent::Close(exit));
    }
}

/// Frame and forward outgoing payloads until the sender side is dropped.
///
/// Dropping the sink closes the child's stdin.
pub(crate) async fn write_stdin(
    stdin: ChildStdin,
    config: FrameConfig,
    mut payloads: UnboundedReceiver<Bytes>,
    events: UnboundedSender<ChannelEvent>,
) {
    let mut sink = FramedWrite::new(stdin, FrameCodec::new(config));
    while let Some(payload) = payloads.recv().await {
        if let Err(err) = sink.send(payload).await {
            warn!(error = %err, "failed to write to stdin");
            emit(
                &events,
                ChannelEvent::Error(ChannelError::from_frame(StreamKind::Stdin, err)),
            );
            break;
        }
    }
    if let Err(err) = sink.close().await {
        debug!(error = %err, "failed to close stdin");
    }
    debug!("stdin closed");
}

async fn read_stdout(
    stdout: Option<ChildStdout>,
    reader: Reader,
    events: &UnboundedSender<ChannelEvent>,
) {
    let Some(stdout) = stdout else {
        return;
    };
    let mut frames = FramedRead::new(stdout, FrameCodec::new(reader.config));
    let mut recovering = false;

    loop {
        match frames.next().await {
            Some(Ok(frame)) => {
                recovering = false;
                deliver(events, StreamKind::Stdout, reader.decoder.deserialize(frame));
            }
            Some(Err(err)) => {
                let fatal = is_fatal(&err);
                report_frame_error(events, StreamKind::Stdout, err);
                if fatal {
                    break;
                }
                recovering = true;
            }
            // After a frame error the reader yields `None` once, then resumes.
            None if recovering => recovering = false,
            None => break,
        }
    }

    // Keep the pipe drained so the child never blocks on a full buffer.
    let mut rest = frames.into_inner();
    if let Err(err) = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await {
        debug!(error = %err, "failed to drain stdout");
    }
}

/// Forward stderr frames and return everything read, for translation.
async fn read_stderr(
    stderr: Option<ChildStderr>,
    reader: Reader,
    events: &UnboundedSender<ChannelEvent>,
) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut captured = Vec::new();
    let mut framer = Some(Framer::with_config(reader.config));
    let mut chunk = vec![0u8; STDERR_CHUNK_SIZE];

    loop {
        let read = match stderr.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                warn!(error = %source, "failed to read stderr");
                emit(
                    events,
                    ChannelEvent::Error(ChannelError::Io {
                        context: "failed to read stderr",
                        source,
                    }),
                );
                break;
            }
        };
        captured.extend_from_slice(&chunk[..read]);

        let Some(active) = framer.as_mut() else {
            continue;
        };
        let mut stop = false;
        for frame in active.push(&chunk[..read]) {
            match frame {
                Ok(frame) => {
                    deliver(events, StreamKind::Stderr, reader.decoder.deserialize(frame))
                }
                Err(err) => {
                    stop = is_fatal(&err);
                    report_frame_error(events, StreamKind::Stderr, err);
                    if stop {
                        break;
                    }
                }
            }
        }
        if stop {
            framer = None;
        }
    }

    if let Some(framer) = framer {
        match framer.finish() {
            Ok(frames) => {
                for frame in frames {
                    deliver(events, StreamKind::Stderr, reader.decoder.deserialize(frame));
                }
            }
            Err(err) => report_frame_error(events, StreamKind::Stderr, err),
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}

async fn wait_for_exit(
    mut child: Child,
    mut kill_rx: UnboundedReceiver<Signal>,
) -> io::Result<ExitInfo> {
    loop {
        tokio::select! {
            status = child.wait() => return status.map(ExitInfo::from),
            Some(signal) = kill_rx.recv() => deliver_signal(&mut child, signal),
        }
    }
}

fn deliver_signal(child: &mut Child, signal: Signal) {
    let Some(pid) = child.id() else {
        debug!(%signal, "child already reaped, not signalling");
        return;
    };

    #[cfg(unix)]
    match pyshell_process::send_signal(pid, signal) {
        Ok(()) => info!(pid, %signal, "signalled child"),
        Err(err) => warn!(pid, %signal, error = %err, "failed to signal child"),
    };

    #[cfg(not(unix))]
    match child.start_kill() {
        Ok(()) => info!(pid, %signal, "terminated child"),
        Err(err) => warn!(pid, error = %err, "failed to terminate child"),
    };
}

fn deliver(
    events: &UnboundedSender<ChannelEvent>,
    stream: StreamKind,
    decoded: pyshell_codec::Result<pyshell_codec::Message>,
) {
    let event = match decoded {
        Ok(message) if stream == StreamKind::Stderr => ChannelEvent::Stderr(message),
        Ok(message) => ChannelEvent::Message(message),
        Err(source) => {
            warn!(%stream, error = %source, "failed to decode frame");
            ChannelEvent::Error(ChannelError::Decode { stream, source })
        }
    };
    emit(events, event);
}

fn report_frame_error(events: &UnboundedSender<ChannelEvent>, stream: StreamKind, err: FrameError) {
    warn!(%stream, error = %err, "dropping frame");
    emit(events, ChannelEvent::Error(ChannelError::from_frame(stream, err)));
}

/// Errors after which the stream cannot be split any further.
fn is_fatal(err: &FrameError) -> bool {
    matches!(err, FrameError::EmptyTerminator | FrameError::Io(_))
}

fn emit(events: &UnboundedSender<ChannelEvent>, event: ChannelEvent) {
    // The channel may have been dropped; the child still runs to completion.
    let _ = events.send(event);
}
