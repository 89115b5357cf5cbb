//! The live session: one task that owns the transport and everything attached to it.
//!
//! [`LiveSession`] is a cheap, cloneable handle. All state lives in a
//! `SessionController` running on its own task, which processes commands, outbound
//! frames, inbound messages and its timers in a single `select!` loop. Inbound
//! messages are therefore handled strictly in arrival order.

use crate::{
    audio::{AudioChunk, AudioOutput, NullOutput, PlaybackScheduler},
    config::{AuthProvider, SessionConfig, StaticAuth},
    error::{LiveError, ModelErrorKind},
    event::{LiveEvent, SessionState, TranscriptSource},
    model,
    outbound::{OUTBOUND_CAPACITY, Outbound, OutboundHandle},
    reconnect::{ReconnectDecision, Reconnector},
    router::{ToolCall, ToolHandler, ToolRouter},
    transcript::TranscriptAggregator,
    transport::{Connector, Transport, TransportError, WebSocketConnector},
};
use futures_util::{SinkExt, StreamExt};
use gemini_live_types::{
    ClientMessage, Inbound, ServerContent, ServerMessage, Transcription, decode_binary,
    decode_text, encode,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

/// Close code used when the stream fails without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

enum Command {
    Connect {
        reply: oneshot::Sender<Result<bool, LiveError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

// --- Builder ---

pub struct SessionBuilder {
    config: SessionConfig,
    connector: Option<Arc<dyn Connector>>,
    auth: Arc<dyn AuthProvider>,
    output: Option<Box<dyn AudioOutput>>,
    router: ToolRouter,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            connector: None,
            auth: Arc::new(StaticAuth::default()),
            output: None,
            router: ToolRouter::new(),
        }
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn auth(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    pub fn output(mut self, output: impl AudioOutput + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn tool(mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        self.router.register(name, handler);
        self
    }

    pub fn tools<I, S>(mut self, names: I, handler: Arc<dyn ToolHandler>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.router.register_all(names, handler);
        self
    }

    /// Spawns the session task. Must be called inside a Tokio runtime.
    pub fn build(self) -> (LiveSession, mpsc::UnboundedReceiver<LiveEvent>) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let outbound = OutboundHandle::new(
            state_rx.clone(),
            outbound_tx,
            self.config.audio_uplink,
            self.config.input_mime_type(),
        );
        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(WebSocketConnector {
                connect_timeout: self.config.connect_timeout,
            }) as Arc<dyn Connector>
        });
        let output = self
            .output
            .unwrap_or_else(|| Box::new(NullOutput::default()) as Box<dyn AudioOutput>);
        let span = info_span!("live_session", model = %self.config.model);

        let controller = SessionController {
            reconnector: Reconnector::new(self.config.reconnect.clone()),
            config: self.config,
            connector,
            auth: self.auth,
            scheduler: PlaybackScheduler::new(output),
            router: self.router,
            manual_close: false,
            transport: None,
            keep_alive: None,
            reconnect_at: None,
            resume_at: None,
            output_transcript: TranscriptAggregator::new(),
            input_transcript: TranscriptAggregator::new(),
            state_tx,
            events: event_tx,
            outbound: outbound.clone(),
            commands: command_rx,
            outbound_rx,
        };
        tokio::spawn(controller.run().instrument(span));

        (
            LiveSession {
                commands: command_tx,
                state: state_rx,
                outbound,
            },
            event_rx,
        )
    }
}

// --- Handle ---

/// Host-facing handle to a live session.
#[derive(Clone)]
pub struct LiveSession {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    outbound: OutboundHandle,
}

impl LiveSession {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Opens the session.
    ///
    /// Returns `Ok(true)` once the transport is open (or already was), `Ok(false)` if
    /// the attempt failed but a reconnect has been scheduled, and an error when the
    /// failure is fatal. A manual connect always starts with a fresh retry budget.
    pub async fn connect(&self) -> Result<bool, LiveError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { reply })
            .await
            .map_err(|_| LiveError::SessionGone)?;
        rx.await.map_err(|_| LiveError::SessionGone)?
    }

    /// Closes the transport, cancels pending timers, flushes playback and moves to
    /// `Closed`. No reconnect is attempted afterwards.
    pub async fn disconnect(&self) -> Result<(), LiveError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { reply })
            .await
            .map_err(|_| LiveError::SessionGone)?;
        rx.await.map_err(|_| LiveError::SessionGone)
    }

    pub fn send_outbound(&self, message: ClientMessage) -> bool {
        self.outbound.send_outbound(message)
    }

    pub fn send_audio_chunk(&self, chunk: &AudioChunk) -> bool {
        self.outbound.send_audio_chunk(chunk)
    }

    pub fn send_video_frame(&self, data: String, mime_type: &str) -> bool {
        self.outbound.send_video_frame(data, mime_type)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn outbound(&self) -> OutboundHandle {
        self.outbound.clone()
    }
}

// --- Controller ---

struct SessionController {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthProvider>,
    scheduler: PlaybackScheduler,
    router: ToolRouter,
    reconnector: Reconnector,
    manual_close: bool,
    transport: Option<Transport>,
    keep_alive: Option<Interval>,
    reconnect_at: Option<Instant>,
    resume_at: Option<Instant>,
    output_transcript: TranscriptAggregator,
    input_transcript: TranscriptAggregator,
    state_tx: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<LiveEvent>,
    outbound: OutboundHandle,
    commands: mpsc::Receiver<Command>,
    outbound_rx: mpsc::Receiver<Outbound>,
}

impl SessionController {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect { reply }) => {
                        let result = self.connect(false).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Disconnect { reply }) => {
                        self.disconnect().await;
                        let _ = reply.send(());
                    }
                    None => {
                        debug!("All session handles dropped, shutting down");
                        self.disconnect().await;
                        break;
                    }
                },
                Some(frame) = self.outbound_rx.recv() => self.write_outbound(frame).await,
                message = next_message(&mut self.transport) => self.on_transport_message(message),
                _ = tick(&mut self.keep_alive) => {
                    trace!("Sending keep-alive");
                    self.send_message(ClientMessage::text_turn("user", " ", false)).await;
                }
                _ = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    // Errors are already reported as events.
                    let _ = self.connect(true).await;
                }
                _ = sleep_until(self.resume_at) => {
                    self.resume_at = None;
                    info!("Sending resume prompt after reconnect");
                    let prompt = self.config.resume_prompt.clone();
                    self.send_message(ClientMessage::text_turn("user", prompt, true)).await;
                }
            }
        }
    }

    // --- Lifecycle ---

    async fn connect(&mut self, auto: bool) -> Result<bool, LiveError> {
        if auto {
            if self.manual_close {
                debug!("Reconnect suppressed after manual disconnect");
                return Ok(false);
            }
        } else {
            self.reconnector.reset();
            self.manual_close = false;
            self.reconnect_at = None;
        }

        if self.transport.is_some() {
            return Ok(true);
        }

        let Some(credentials) = self.auth.credentials() else {
            warn!("No credentials available, refusing to connect");
            return Err(self.fail(LiveError::AuthRequired));
        };

        if let Err(e) = self.scheduler.ensure_open() {
            error!(error = %e, "Failed to open audio output");
            self.emit_error(&LiveError::AudioPlayback(e.to_string()));
        }

        self.set_state(SessionState::Connecting);
        info!(
            url = %self.config.redacted_url(&credentials),
            attempt = self.reconnector.attempt(),
            "Connecting to Gemini Live"
        );

        let mut transport = match self.connector.connect(&self.config.url(&credentials)).await {
            Ok(transport) => transport,
            Err(e) => return self.on_open_failure(e),
        };

        let setup = encode(&ClientMessage::Setup(self.config.setup()))
            .map_err(|e| self.fail(e.into()))?;
        if let Err(e) = transport.sink.send(WsMessage::Text(setup.into())).await {
            return self.on_open_failure(TransportError::Io(e.to_string()));
        }

        self.on_open(transport);
        Ok(true)
    }

    fn on_open(&mut self, transport: Transport) {
        let resumed = self.reconnector.attempt() > 0;
        self.transport = Some(transport);
        self.reconnector.reset();
        self.reconnect_at = None;

        let period = self.config.keep_alive_interval;
        self.keep_alive = (!period.is_zero()).then(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        if resumed && !self.config.resume_prompt.is_empty() {
            self.resume_at = Some(Instant::now() + self.config.resume_delay);
        }

        self.set_state(SessionState::Open);
        info!(resumed, "Session open");
    }

    fn on_open_failure(&mut self, err: TransportError) -> Result<bool, LiveError> {
        if let TransportError::Rejected { status, body } = &err {
            if !err.is_transient() {
                let raw = format!("HTTP {}: {}", status, body);
                warn!(status, "Handshake rejected by the service");
                return Err(self.fail(self.model_unavailable(&raw)));
            }
        }
        warn!(error = %err, "Failed to open transport");
        self.schedule_reconnect(err.to_string())
    }

    fn on_closed(&mut self, code: u16, reason: String) {
        self.drop_transport();
        if self.manual_close {
            return;
        }
        info!(code, reason = %reason, "Transport closed");

        let lower = reason.to_lowercase();
        if lower.contains("deadline") || lower.contains("expired") {
            self.fail(LiveError::SessionExpired(reason));
            return;
        }
        match code {
            1002 | 1003 | 1007 => {
                let detail = if reason.is_empty() {
                    code.to_string()
                } else {
                    reason
                };
                self.fail(LiveError::Connection(format!("Closed: {}", detail)));
            }
            1008 => {
                let err = self.model_unavailable(&reason);
                self.fail(err);
            }
            _ => {
                let _ = self.schedule_reconnect(format!("closed with code {}", code));
            }
        }
    }

    fn schedule_reconnect(&mut self, reason: String) -> Result<bool, LiveError> {
        match self.reconnector.on_failure() {
            ReconnectDecision::Retry { attempt, delay } => {
                warn!(
                    attempt,
                    max_attempts = self.reconnector.max_attempts(),
                    ?delay,
                    reason = %reason,
                    "Connection lost, scheduling reconnect"
                );
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_state(SessionState::Connecting);
                Ok(false)
            }
            ReconnectDecision::Exhausted { attempts } => {
                error!(attempts, reason = %reason, "Giving up on reconnecting");
                Err(self.fail(LiveError::Connection(format!(
                    "Connection failed after {} attempts: {}",
                    attempts, reason
                ))))
            }
        }
    }

    async fn disconnect(&mut self) {
        self.manual_close = true;
        self.reconnect_at = None;
        self.resume_at = None;
        self.keep_alive = None;

        if self.transport.is_some() {
            self.set_state(SessionState::Closing);
        }
        if let Some(mut transport) = self.transport.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, transport.sink.close()).await {
                Ok(Err(e)) => debug!(error = %e, "Error while closing transport"),
                Err(_) => debug!("Timed out closing transport"),
                Ok(Ok(())) => {}
            }
        }

        self.scheduler
            .close(self.config.disconnect_fade_out.as_secs_f64())
            .await;
        self.flush_transcripts();
        self.set_state(SessionState::Closed);
        info!("Session closed");
    }

    /// Tears down per-connection state after the transport went away.
    fn drop_transport(&mut self) {
        self.transport = None;
        self.keep_alive = None;
        self.resume_at = None;
        self.scheduler.interrupt();
        self.flush_transcripts();
    }

    // --- Inbound ---

    fn on_transport_message(&mut self, message: Option<Result<WsMessage, WsError>>) {
        match message {
            Some(Ok(WsMessage::Text(text))) => match decode_text(text.as_str()) {
                Ok(msg) => self.handle_server_message(msg),
                Err(e) => warn!(error = %e, "Ignoring undecodable message"),
            },
            Some(Ok(WsMessage::Binary(payload))) => match decode_binary(payload) {
                Inbound::Message(msg) => self.handle_server_message(*msg),
                Inbound::RawAudio(bytes) => {
                    let chunk = AudioChunk::from_le_bytes(&bytes, self.config.output_sample_rate);
                    self.play(chunk);
                }
            },
            Some(Ok(WsMessage::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((1005, String::new()));
                self.on_closed(code, reason);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => self.on_closed(ABNORMAL_CLOSURE, e.to_string()),
            None => self.on_closed(ABNORMAL_CLOSURE, String::new()),
        }
    }

    fn handle_server_message(&mut self, msg: ServerMessage) {
        if msg.setup_complete.is_some() {
            debug!("Setup complete");
        }
        if let Some(content) = msg.server_content {
            self.handle_server_content(content);
        }
        if let Some(tool_call) = msg.tool_call {
            for function_call in tool_call.function_calls {
                let call = ToolCall::from(function_call);
                info!(tool = %call.name, id = %call.id, "Tool call received");
                self.emit(LiveEvent::ToolInvoked(call.clone()));
                self.router
                    .dispatch(call, self.outbound.clone(), self.events.clone());
            }
        }
        if let Some(cancellation) = msg.tool_call_cancellation {
            self.router.cancel(&cancellation.ids);
        }
        if let Some(go_away) = msg.go_away {
            warn!(time_left = ?go_away.time_left, "Service announced the connection will end");
        }
    }

    fn handle_server_content(&mut self, content: ServerContent) {
        if content.interrupted {
            debug!("Interrupted by user speech");
            self.scheduler.interrupt();
            if let Some(text) = self.output_transcript.finalize() {
                self.emit_transcript(TranscriptSource::Output, text);
            }
            self.emit(LiveEvent::Interrupted);
            return;
        }

        if let Some(turn) = &content.model_turn {
            for part in &turn.parts {
                let Some(blob) = part.audio() else { continue };
                match AudioChunk::from_base64(
                    &blob.data,
                    &blob.mime_type,
                    self.config.output_sample_rate,
                ) {
                    Ok(chunk) => self.play(chunk),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable audio chunk");
                        self.emit_error(&e);
                    }
                }
            }
        }

        if let Some(transcription) = content.output_transcription {
            self.on_transcription(TranscriptSource::Output, transcription);
        }
        if let Some(transcription) = content.input_transcription {
            self.on_transcription(TranscriptSource::Input, transcription);
        }
        if content.turn_complete || content.generation_complete {
            if let Some(text) = self.output_transcript.finalize() {
                self.emit_transcript(TranscriptSource::Output, text);
            }
        }
    }

    fn play(&mut self, chunk: AudioChunk) {
        self.emit(LiveEvent::AudioReady(chunk.clone()));
        if let Err(e) = self.scheduler.enqueue(chunk) {
            warn!(error = %e, "Failed to schedule audio chunk");
            self.emit_error(&LiveError::AudioPlayback(e.to_string()));
        }
    }

    fn on_transcription(&mut self, source: TranscriptSource, transcription: Transcription) {
        let aggregator = match source {
            TranscriptSource::Input => &mut self.input_transcript,
            TranscriptSource::Output => &mut self.output_transcript,
        };
        if let Some(text) = aggregator.on_delta(&transcription.text, transcription.finished) {
            self.emit_transcript(source, text);
        }
    }

    fn flush_transcripts(&mut self) {
        if let Some(text) = self.output_transcript.finalize() {
            self.emit_transcript(TranscriptSource::Output, text);
        }
        if let Some(text) = self.input_transcript.finalize() {
            self.emit_transcript(TranscriptSource::Input, text);
        }
    }

    // --- Outbound ---

    async fn write_outbound(&mut self, frame: Outbound) {
        match frame {
            Outbound::Message(msg) => self.send_message(msg).await,
            Outbound::Audio(bytes) => self.send_frame(WsMessage::Binary(bytes)).await,
        }
    }

    async fn send_message(&mut self, msg: ClientMessage) {
        match encode(&msg) {
            Ok(text) => self.send_frame(WsMessage::Text(text.into())).await,
            Err(e) => error!(error = %e, "Failed to encode outbound message"),
        }
    }

    /// Writes one frame. Frames are dropped when no transport is open.
    async fn send_frame(&mut self, frame: WsMessage) {
        let Some(transport) = self.transport.as_mut() else {
            trace!("No transport, dropping outbound frame");
            return;
        };
        if let Err(e) = transport.sink.send(frame).await {
            warn!(error = %e, "Send failed");
            self.on_closed(ABNORMAL_CLOSURE, e.to_string());
        }
    }

    // --- Reporting ---

    fn model_unavailable(&self, raw: &str) -> LiveError {
        let kind = ModelErrorKind::classify(raw);
        let model_id = model::extract_model_id(raw).unwrap_or_else(|| self.config.model.clone());
        warn!(?kind, raw = %raw, "Model unavailable");
        LiveError::ModelUnavailable {
            model: model::display_name(&model_id),
            kind,
            message: kind.description().to_string(),
        }
    }

    /// Reports a fatal error and closes the session. Returns the error for the caller.
    fn fail(&mut self, err: LiveError) -> LiveError {
        self.reconnect_at = None;
        self.emit_error(&err);
        self.set_state(SessionState::Closed);
        err
    }

    fn set_state(&mut self, state: SessionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(?state, "Session state changed");
            self.emit(LiveEvent::StateChanged(state));
        }
    }

    fn emit_transcript(&self, source: TranscriptSource, text: String) {
        self.emit(LiveEvent::TranscriptDelta {
            source,
            text,
            finalized: true,
        });
    }

    fn emit_error(&self, err: &LiveError) {
        self.emit(LiveEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn emit(&self, event: LiveEvent) {
        // The host may have stopped listening; the session keeps running regardless.
        let _ = self.events.send(event);
    }
}

async fn next_message(transport: &mut Option<Transport>) -> Option<Result<WsMessage, WsError>> {
    match transport {
        Some(transport) => transport.stream.next().await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
