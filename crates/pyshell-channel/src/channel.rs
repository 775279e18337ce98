use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use pyshell_codec::{Codec, Deserializer, Message, Serializer};
use pyshell_frame::{FrameConfig, DEFAULT_MAX_FRAME};
use pyshell_process::{ExitInfo, Signal};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::{ChannelError, Result};
use crate::event::{ChannelEvent, ErrorSlot, Listeners};
use crate::options::ChannelOptions;
use crate::script_error::ScriptError;
use crate::supervisor::{write_stdin, Reader, Supervisor};
use crate::translate::ScriptContext;

/// Lifecycle of a channel. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ChannelState {
    /// The child is being launched.
    Starting = 0,
    /// The child is running and stdin is open.
    Running = 1,
    /// Stdin was closed; waiting for the child to exit.
    Ending = 2,
    /// Killed, exited or never started.
    Terminated = 3,
}

impl ChannelState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ChannelState::Starting,
            1 => ChannelState::Running,
            2 => ChannelState::Ending,
            _ => ChannelState::Terminated,
        }
    }
}

/// Channel state shared between the handle and its background tasks.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ChannelState::Starting as u8))
    }

    pub(crate) fn get(&self) -> ChannelState {
        ChannelState::from_raw(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` if that is forward of the current state.
    ///
    /// Returns true when this call made the transition.
    pub(crate) fn advance(&self, to: ChannelState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (to as u8 > current).then_some(to as u8)
            })
            .is_ok()
    }
}

/// Codecs for the child's streams: one pair for stdin/stdout, one for stderr.
#[derive(Debug, Clone)]
pub struct ChannelCodecs {
    /// Serializes outgoing messages and decodes stdout.
    pub messages: Codec,
    /// Decodes stderr.
    pub stderr: Codec,
}

impl ChannelCodecs {
    /// Default codecs for the modes and terminator in `options`.
    pub fn from_options(options: &ChannelOptions) -> Self {
        let mode = options.effective_mode();
        let stderr_mode = options.effective_stderr_mode();
        Self {
            messages: Codec::new(mode).with_framing(options.framing_for(mode)),
            stderr: Codec::new(stderr_mode).with_framing(options.framing_for(stderr_mode)),
        }
    }

    /// Replace how outgoing messages are rendered.
    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.messages = self.messages.with_serializer(serializer);
        self
    }

    /// Replace how stdout frames are decoded.
    pub fn with_parser(mut self, parser: impl Deserializer + 'static) -> Self {
        self.messages = self.messages.with_deserializer(parser);
        self
    }

    /// Replace how stderr frames are decoded.
    pub fn with_stderr_parser(mut self, parser: impl Deserializer + 'static) -> Self {
        self.stderr = self.stderr.with_deserializer(parser);
        self
    }
}

/// Cloneable handle that can kill a channel's child from anywhere.
#[derive(Debug, Clone)]
pub struct KillHandle {
    state: Arc<StateCell>,
    signals: UnboundedSender<Signal>,
}

impl KillHandle {
    /// Terminate the child with `signal` (default `SIGTERM`).
    ///
    /// The channel counts as terminated as soon as this returns. Returns
    /// false, and does nothing, if it already was.
    pub fn kill(&self, signal: Option<Signal>) -> bool {
        if !self.state.advance(ChannelState::Terminated) {
            return false;
        }
        let signal = signal.unwrap_or(Signal::DEFAULT_KILL);
        debug!(%signal, "kill requested");
        // The supervisor is gone only if the child was already reaped.
        let _ = self.signals.send(signal);
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.state.get() == ChannelState::Terminated
    }
}

enum Stdin {
    Open(UnboundedSender<Bytes>),
    Closed,
    Unavailable,
}

/// A running interpreter and the message streams around it.
///
/// Spawning never fails directly: a launch failure is reported as an
/// `Error` event followed by `Close`, like every other outcome. Events are
/// taken with [`next_event`](Self::next_event), which also runs the
/// listeners registered with the `on_*` methods, or all at once by
/// [`end`](Self::end).
///
/// Must be created inside a Tokio runtime.
pub struct ProcessChannel {
    script: String,
    options: ChannelOptions,
    program: PathBuf,
    command: Vec<String>,
    pid: Option<u32>,
    codec: Codec,
    stdin: Stdin,
    state: Arc<StateCell>,
    killer: KillHandle,
    events: UnboundedReceiver<ChannelEvent>,
    listeners: Listeners,
    exit: Option<ExitInfo>,
    closed: bool,
}

impl ProcessChannel {
    /// Start `script` with the default codecs for `options`.
    pub fn spawn(script: impl Into<String>, options: ChannelOptions) -> Self {
        let codecs = ChannelCodecs::from_options(&options);
        Self::spawn_with_codecs(script, options, codecs)
    }

    /// Start `script` with caller-supplied codecs.
    pub fn spawn_with_codecs(
        script: impl Into<String>,
        options: ChannelOptions,
        codecs: ChannelCodecs,
    ) -> Self {
        let script = script.into();
        let spec = options.launch_spec(&script);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let state = Arc::new(StateCell::new());

        let mut channel = ProcessChannel {
            program: spec.program().to_path_buf(),
            command: spec.arguments().to_vec(),
            pid: None,
            codec: codecs.messages.clone(),
            stdin: Stdin::Unavailable,
            killer: KillHandle {
                state: Arc::clone(&state),
                signals: kill_tx,
            },
            state,
            events,
            listeners: Listeners::default(),
            exit: None,
            closed: false,
            script,
            options,
        };

        let mut child = match spec.spawn() {
            Ok(child) => child,
            Err(err) => {
                let err = ChannelError::from(err);
                warn!(
                    program = %channel.program.display(),
                    error = %err,
                    "failed to spawn interpreter"
                );
                channel.state.advance(ChannelState::Terminated);
                let _ = event_tx.send(ChannelEvent::Error(err));
                let _ = event_tx.send(ChannelEvent::Close(ExitInfo::default()));
                return channel;
            }
        };
        channel.pid = child.id();
        channel.state.advance(ChannelState::Running);
        info!(
            pid = ?channel.pid,
            program = %channel.program.display(),
            script = %channel.script,
            "spawned interpreter"
        );

        let max_frame_size = channel.options.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME);
        let frame_config = |codec: &Codec| FrameConfig {
            framing: codec.framing().clone(),
            max_frame_size,
        };

        if let Some(stdin) = child.stdin.take() {
            let (payload_tx, payload_rx) = mpsc::unbounded_channel();
            tokio::spawn(write_stdin(
                stdin,
                frame_config(&codecs.messages),
                payload_rx,
                event_tx.clone(),
            ));
            channel.stdin = Stdin::Open(payload_tx);
        }

        let supervisor = Supervisor {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            stdout_reader: Reader {
                config: frame_config(&codecs.messages),
                decoder: codecs.messages.deserializer(),
            },
            stderr_reader: Reader {
                config: frame_config(&codecs.stderr),
                decoder: codecs.stderr.deserializer(),
            },
            kill_rx,
            events: event_tx,
            state: Arc::clone(&channel.state),
            context: ScriptContext {
                script: channel.script.clone(),
                args: channel.args().to_vec(),
                options: channel.options.clone(),
            },
        };
        tokio::spawn(supervisor.run());

        channel
    }

    /// Serialize `message` and write it to the child's stdin.
    ///
    /// Writes happen in the background, in call order. A failed write is
    /// reported later as an `Error` event.
    pub fn send(&mut self, message: impl Into<Message>) -> Result<&mut Self> {
        if self.is_terminated() {
            return Err(ChannelError::Terminated);
        }
        let payloads = match &self.stdin {
            Stdin::Open(payloads) => payloads,
            Stdin::Closed => return Err(ChannelError::StdinClosed),
            Stdin::Unavailable => return Err(ChannelError::StdinUnavailable),
        };
        let payload = self
            .codec
            .serialize(&message.into())
            .map_err(ChannelError::Encode)?;
        payloads
            .send(payload)
            .map_err(|_| ChannelError::StdinClosed)?;
        Ok(self)
    }

    /// Close the child's stdin without waiting.
    pub fn end_input(&mut self) -> &mut Self {
        if matches!(self.stdin, Stdin::Open(_)) {
            debug!(pid = ?self.pid, "closing stdin");
            self.stdin = Stdin::Closed;
        }
        self.state.advance(ChannelState::Ending);
        self
    }

    /// Close stdin and wait for the channel to close.
    ///
    /// Every remaining event is dispatched to the listeners on the way. The
    /// result is the first of: a spawn failure, the script failure, or the
    /// first other error if no `on_error` listener is registered.
    pub async fn end(mut self) -> Result<ExitInfo> {
        self.end_input();
        let report_all = !self.listeners.handles_errors();
        let mut errors = ErrorSlot::default();
        let mut exit = self.exit.unwrap_or_default();

        while let Some(event) = self.next_event().await {
            match event {
                ChannelEvent::Error(err)
                    if report_all || matches!(err, ChannelError::Spawn { .. }) =>
                {
                    errors.offer(err)
                }
                ChannelEvent::ScriptError(err) => errors.offer(ChannelError::Script(err)),
                ChannelEvent::Close(info) => exit = info,
                _ => {}
            }
        }

        match errors.take() {
            Some(err) => Err(err),
            None => Ok(exit),
        }
    }

    /// Take the next event, running matching listeners first.
    ///
    /// Returns `None` once `Close` has been returned.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        let Some(event) = self.events.recv().await else {
            self.closed = true;
            return None;
        };
        if let ChannelEvent::Close(exit) = &event {
            self.exit = Some(*exit);
            self.closed = true;
        }
        self.listeners.dispatch(&event);
        Some(event)
    }

    /// Kill the child. See [`KillHandle::kill`].
    pub fn kill(&self, signal: Option<Signal>) -> bool {
        self.killer.kill(signal)
    }

    /// A handle that can kill this channel's child from another task.
    pub fn kill_handle(&self) -> KillHandle {
        self.killer.clone()
    }

    pub fn on_message(&mut self, listener: impl FnMut(&Message) + Send + 'static) -> &mut Self {
        self.listeners.message.push(Box::new(listener));
        self
    }

    pub fn on_stderr(&mut self, listener: impl FnMut(&Message) + Send + 'static) -> &mut Self {
        self.listeners.stderr.push(Box::new(listener));
        self
    }

    /// Registering any error listener stops [`end`](Self::end) from
    /// returning decode and pipe errors.
    pub fn on_error(&mut self, listener: impl FnMut(&ChannelError) + Send + 'static) -> &mut Self {
        self.listeners.error.push(Box::new(listener));
        self
    }

    pub fn on_script_error(
        &mut self,
        listener: impl FnMut(&ScriptError) + Send + 'static,
    ) -> &mut Self {
        self.listeners.script_error.push(Box::new(listener));
        self
    }

    pub fn on_close(&mut self, listener: impl FnMut(&ExitInfo) + Send + 'static) -> &mut Self {
        self.listeners.close.push(Box::new(listener));
        self
    }

    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// True after a kill, an exit or a failed spawn.
    pub fn is_terminated(&self) -> bool {
        self.state() == ChannelState::Terminated
    }

    /// Process id, if the child was started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit code, once `Close` has been taken.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit.and_then(|exit| exit.code)
    }

    /// Terminating signal, once `Close` has been taken.
    pub fn exit_signal(&self) -> Option<Signal> {
        self.exit.and_then(|exit| exit.signal)
    }

    pub fn exit(&self) -> Option<ExitInfo> {
        self.exit
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Interpreter that was launched.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full interpreter argument list: options, script, then script arguments.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Arguments given to the script.
    pub fn args(&self) -> &[String] {
        self.options.args.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for ProcessChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessChannel")
            .field("script", &self.script)
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("state", &self.state())
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}
