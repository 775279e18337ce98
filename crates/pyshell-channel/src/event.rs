use pyshell_codec::Message;
use pyshell_process::ExitInfo;

use crate::error::ChannelError;
use crate::script_error::ScriptError;

/// Something that happened on a channel, in arrival order.
///
/// `Close` is always the last event and is produced exactly once, after
/// stdout and stderr have been drained and the child has been reaped. A
/// `ScriptError` for the run, if any, comes right before it.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A decoded stdout frame.
    Message(Message),
    /// A decoded stderr frame.
    Stderr(Message),
    /// A spawn, pipe or decode failure. The channel keeps going unless the
    /// error is a spawn failure.
    Error(ChannelError),
    /// The script failed.
    ScriptError(Box<ScriptError>),
    /// The child exited and both output streams are closed.
    Close(ExitInfo),
}

type Listener<T> = Box<dyn FnMut(&T) + Send>;

/// Callbacks registered on a channel, run as events are taken from it.
#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) message: Vec<Listener<Message>>,
    pub(crate) stderr: Vec<Listener<Message>>,
    pub(crate) error: Vec<Listener<ChannelError>>,
    pub(crate) script_error: Vec<Listener<ScriptError>>,
    pub(crate) close: Vec<Listener<ExitInfo>>,
}

impl Listeners {
    pub(crate) fn dispatch(&mut self, event: &ChannelEvent) {
        fn call<T>(listeners: &mut [Listener<T>], value: &T) {
            for listener in listeners {
                listener(value);
            }
        }

        match event {
            ChannelEvent::Message(message) => call(&mut self.message, message),
            ChannelEvent::Stderr(message) => call(&mut self.stderr, message),
            ChannelEvent::Error(err) => call(&mut self.error, err),
            ChannelEvent::ScriptError(err) => call(&mut self.script_error, &**err),
            ChannelEvent::Close(exit) => call(&mut self.close, exit),
        }
    }

    pub(crate) fn handles_errors(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Picks the error a finished run reports.
///
/// A spawn failure wins over a script failure, which wins over the first
/// other error seen.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    spawn: Option<ChannelError>,
    script: Option<ChannelError>,
    other: Option<ChannelError>,
}

impl ErrorSlot {
    pub(crate) fn offer(&mut self, err: ChannelError) {
        let slot = match err {
            ChannelError::Spawn { .. } => &mut self.spawn,
            ChannelError::Script(_) => &mut self.script,
            _ => &mut self.other,
        };
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub(crate) fn take(self) -> Option<ChannelError> {
        self.spawn.or(self.script).or(self.other)
    }
}
