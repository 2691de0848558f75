//! Streaming response consumption.
//!
//! A [`StreamConsumer`] sends the conversation to the backend through a
//! [`Transport`] and folds the streamed body into a [`ConversationStore`] as it
//! arrives. Each request/response cycle is a [`StreamSession`] that walks the
//! state machine
//!
//! ```text
//! Idle -> Connecting -> Streaming -> Completed
//!             |             |
//!             +-> Failed <--+
//! ```
//!
//! Stream failures never escape as errors: a connection failure becomes one
//! assistant message saying so, and a mid-stream failure keeps the partial
//! reply and appends a marker. `send` only returns `Err` when it refuses to
//! start because another turn is unresolved.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::client::Transport;
use crate::conversation::ConversationStore;
use crate::error::{Error, Result};
use crate::observability::{
    STREAM_ABORTS, STREAM_BYTES, STREAM_CHUNKS, STREAM_COMPLETIONS, STREAM_CONNECTION_FAILURES,
    STREAM_DURATION, STREAM_INTERRUPTIONS, STREAM_REJECTIONS, STREAM_REQUESTS, STREAM_TTFB,
};
use crate::types::{ChatRequest, RequestParams};

/// Assistant message recorded when the backend cannot be reached.
pub const CONNECTION_FAILED_MESSAGE: &str = "Error: could not connect to the AION core.";

/// Appended to a partial reply when reading the body fails.
pub const STREAM_INTERRUPTED_MARKER: &str = "\n\n[stream interrupted]";

/// Appended to a partial reply when the user stops the stream.
pub const USER_INTERRUPTED_MARKER: &str = "\n\n[interrupted]";

///////////////////////////////////////////// State /////////////////////////////////////////////

/// Lifecycle of one request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing sent yet.
    Idle,
    /// Request submitted, waiting for response headers.
    Connecting,
    /// Reading the response body.
    Streaming,
    /// The body was read to the end.
    Completed,
    /// The request or the body read failed.
    Failed,
}

impl SessionState {
    /// Returns true if the machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Streaming)
                | (Connecting, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }

    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

//////////////////////////////////////////// Decoding ///////////////////////////////////////////

/// Incremental UTF-8 decoder.
///
/// A character split across chunk boundaries is held back until its remaining
/// bytes arrive. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + chunk` as forms complete characters.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut input: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    input = &[];
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&input[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + len..];
                        }
                        None => {
                            input = &input[valid..];
                            break;
                        }
                    }
                }
            }
        }
        let rest = input.to_vec();
        self.pending = rest;
        out
    }

    /// Flushes bytes still held back; an incomplete character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// Returns true if bytes are waiting for the rest of a character.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

//////////////////////////////////////////// Session ////////////////////////////////////////////

/// State of one request/response cycle.
#[derive(Debug)]
pub struct StreamSession {
    state: SessionState,
    decoder: Utf8Decoder,
    chars: u64,
    chunks: u64,
    bytes: u64,
    started: Instant,
    first_byte: Option<Duration>,
}

impl StreamSession {
    /// Creates an idle session.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            decoder: Utf8Decoder::new(),
            chars: 0,
            chunks: 0,
            bytes: 0,
            started: Instant::now(),
            first_byte: None,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the number of body bytes read so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns the number of characters decoded so far.
    pub fn chars(&self) -> u64 {
        self.chars
    }

    /// Moves to `next`, rejecting transitions the machine does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::invalid_transition(self.state, next));
        }
        tracing::trace!(from = %self.state, to = %next, "stream session transition");
        self.state = next;
        Ok(())
    }

    /// Accepts one body chunk and returns the text it completes.
    pub fn accept(&mut self, chunk: &[u8]) -> String {
        if self.first_byte.is_none() {
            self.first_byte = Some(self.started.elapsed());
        }
        self.chunks += 1;
        self.bytes += chunk.len() as u64;
        let text = self.decoder.decode(chunk);
        self.chars += text.chars().count() as u64;
        text
    }

    /// Flushes the decoder at end of body.
    pub fn flush(&mut self) -> String {
        let text = self.decoder.finish();
        self.chars += text.chars().count() as u64;
        text
    }

    fn report(&self, failure: Option<Error>) -> StreamReport {
        StreamReport {
            state: self.state,
            failure,
            chunks: self.chunks,
            bytes: self.bytes,
            elapsed: self.started.elapsed(),
            time_to_first_byte: self.first_byte,
        }
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one [`StreamConsumer::send`].
#[derive(Debug, Clone)]
pub struct StreamReport {
    /// Terminal state of the session.
    pub state: SessionState,
    /// Why the session failed, if it did.
    pub failure: Option<Error>,
    /// Number of body chunks read.
    pub chunks: u64,
    /// Number of body bytes read.
    pub bytes: u64,
    /// Wall time from submit to terminal state.
    pub elapsed: Duration,
    /// Time until the first body chunk arrived.
    pub time_to_first_byte: Option<Duration>,
}

impl StreamReport {
    /// Returns true if the body was read to the end.
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}

//////////////////////////////////////////// Guards /////////////////////////////////////////////

/// Marks the consumer busy for the lifetime of one session.
struct SessionGuard<'a> {
    active: &'a AtomicBool,
}

impl<'a> SessionGuard<'a> {
    fn acquire(active: &'a AtomicBool) -> Option<Self> {
        active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { active })
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// An assistant turn that is ended when dropped, even if the send future is.
struct ActiveTurn<'a> {
    store: &'a mut ConversationStore,
}

impl<'a> ActiveTurn<'a> {
    fn begin(store: &'a mut ConversationStore) -> Result<Self> {
        store.begin_assistant_turn()?;
        Ok(Self { store })
    }

    fn extend(&mut self, delta: &str) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        self.store.extend_assistant_turn(delta)
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        self.store.end_assistant_turn();
    }
}

/////////////////////////////////////////// Consumer ////////////////////////////////////////////

/// Sends conversations and streams replies into a [`ConversationStore`].
pub struct StreamConsumer {
    transport: Arc<dyn Transport>,
    active: AtomicBool,
    interrupt: Option<Arc<AtomicBool>>,
}

impl StreamConsumer {
    /// Creates a consumer over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            active: AtomicBool::new(false),
            interrupt: None,
        }
    }

    /// Attaches a flag that stops the current stream when set.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Returns true while a session is unresolved.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn should_interrupt(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Sends the conversation in `store` and streams the reply into it.
    ///
    /// Rejected with [`Error::TurnInProgress`], before any network activity and
    /// without touching `store`, when this consumer already has a session in
    /// flight or `store` has an assistant turn in progress. Every other failure
    /// is recorded in the conversation and reported in the returned
    /// [`StreamReport`].
    pub async fn send(
        &self,
        store: &mut ConversationStore,
        params: &RequestParams,
    ) -> Result<StreamReport> {
        if store.is_in_progress() {
            STREAM_REJECTIONS.click();
            return Err(Error::TurnInProgress);
        }
        let Some(_active) = SessionGuard::acquire(&self.active) else {
            STREAM_REJECTIONS.click();
            return Err(Error::TurnInProgress);
        };

        let mut session = StreamSession::new();
        session.transition(SessionState::Connecting)?;
        STREAM_REQUESTS.click();

        let request = ChatRequest::new(store.snapshot(), params);
        let mut body = match self.transport.open(&params.endpoint_base, &request).await {
            Ok(body) => body,
            Err(err) => {
                let err = into_connection_failure(err);
                tracing::warn!(model = %params.model_identifier, "chat request failed: {err}");
                STREAM_CONNECTION_FAILURES.click();
                session.transition(SessionState::Failed)?;
                let mut turn = ActiveTurn::begin(store)?;
                turn.extend(CONNECTION_FAILED_MESSAGE)?;
                drop(turn);
                return Ok(self.finish(&session, Some(err)));
            }
        };

        session.transition(SessionState::Streaming)?;
        let mut turn = ActiveTurn::begin(store)?;
        let failure = loop {
            if self.should_interrupt() {
                break Some(Error::aborted("stream stopped by user"));
            }
            match body.next().await {
                Some(Ok(chunk)) => {
                    let text = session.accept(&chunk);
                    turn.extend(&text)?;
                }
                Some(Err(err)) => break Some(into_stream_interruption(err)),
                None => break None,
            }
        };
        let tail = session.flush();
        turn.extend(&tail)?;

        match &failure {
            None => {
                session.transition(SessionState::Completed)?;
                STREAM_COMPLETIONS.click();
            }
            Some(err) if err.is_aborted() => {
                turn.extend(USER_INTERRUPTED_MARKER)?;
                session.transition(SessionState::Failed)?;
                STREAM_ABORTS.click();
            }
            Some(err) => {
                tracing::warn!(
                    bytes = session.bytes(),
                    chars = session.chars(),
                    "chat stream interrupted: {err}"
                );
                turn.extend(STREAM_INTERRUPTED_MARKER)?;
                session.transition(SessionState::Failed)?;
                STREAM_INTERRUPTIONS.click();
            }
        }
        drop(turn);
        Ok(self.finish(&session, failure))
    }

    fn finish(&self, session: &StreamSession, failure: Option<Error>) -> StreamReport {
        let report = session.report(failure);
        STREAM_CHUNKS.count(report.chunks);
        STREAM_BYTES.count(report.bytes);
        STREAM_DURATION.add(report.elapsed.as_secs_f64());
        if let Some(ttfb) = report.time_to_first_byte {
            STREAM_TTFB.add(ttfb.as_secs_f64());
        }
        tracing::debug!(
            state = %report.state,
            chunks = report.chunks,
            bytes = report.bytes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "stream session finished"
        );
        report
    }
}

impl fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("active", &self.is_active())
            .field("interruptible", &self.interrupt.is_some())
            .finish()
    }
}

fn into_connection_failure(err: Error) -> Error {
    if err.is_connection_failed() {
        err
    } else {
        Error::connection_failed(err.to_string(), None, Some(Box::new(err)))
    }
}

fn into_stream_interruption(err: Error) -> Error {
    if err.is_stream_interrupted() {
        err
    } else {
        Error::stream_interrupted(err.to_string(), Some(Box::new(err)))
    }
}
