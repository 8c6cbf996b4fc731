//! The session controller: the state machine behind connect/disconnect.
//!
//! The controller runs as a single task that owns the transport handle and
//! the audio capture for the lifetime of a session. It multiplexes four
//! sources: commands from the presentation layer, events from the transport,
//! the outcome of starting capture, and chunks from capture. The presentation
//! layer only ever holds a [`SessionHandle`].

use crate::{
    audio::{AudioCapture, AudioChunk, AudioPlayback},
    config::SessionConfig,
    error::{AudioError, SessionError},
    message_log::MessageLog,
    protocol::{ClientFrame, InboundFrame},
    state::SessionState,
    transport::{Connector, TransportEvent, TransportHandle},
};
use std::sync::Arc;
use tokio::{
    sync::{RwLock, broadcast, mpsc, watch},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, instrument, trace, warn};

const COMMAND_CAPACITY: usize = 16;
const CHUNK_CAPACITY: usize = 8;
const EVENT_CAPACITY: usize = 256;

/// Commands accepted by the controller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    Connect,
    Disconnect,
    /// Connect when disconnected, disconnect otherwise.
    Toggle,
    Shutdown,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A frame was appended to the message log.
    Message(InboundFrame),
    /// A local, non-fatal failure (connection, microphone or decoding).
    Error(String),
}

/// The presentation layer's view of the session. Cheap to clone.
///
/// The controller task ends once every handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    log: Arc<RwLock<MessageLog>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Connect).await
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Disconnect).await
    }

    pub async fn toggle(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Toggle).await
    }

    /// Tears down any active session and stops the controller task.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Shutdown).await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// A snapshot of the message log.
    pub async fn messages(&self) -> Vec<InboundFrame> {
        self.log.read().await.as_slice().to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn command(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ControllerStopped)
    }
}

/// The outcome of a capture start that ran beside the controller loop.
struct CaptureStart {
    capture: Box<dyn AudioCapture>,
    generation: u64,
    chunks: mpsc::Receiver<AudioChunk>,
    result: Result<(), AudioError>,
}

pub struct SessionController {
    config: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    /// `None` while a start is in flight.
    capture: Option<Box<dyn AudioCapture>>,
    starting: Option<JoinHandle<CaptureStart>>,
    /// Bumped on every connect so a late capture start can tell whether its
    /// session is still the current one.
    generation: u64,
    playback: Arc<dyn AudioPlayback>,
    commands: mpsc::Receiver<SessionCommand>,
    state: watch::Sender<SessionState>,
    log: Arc<RwLock<MessageLog>>,
    events: broadcast::Sender<SessionEvent>,
    transport: Option<TransportHandle>,
    chunks: Option<mpsc::Receiver<AudioChunk>>,
    capturing: bool,
}

impl SessionController {
    pub fn new(
        config: Arc<SessionConfig>,
        connector: Arc<dyn Connector>,
        capture: Box<dyn AudioCapture>,
        playback: Arc<dyn AudioPlayback>,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let log = Arc::new(RwLock::new(MessageLog::new()));

        let handle = SessionHandle {
            commands: commands_tx,
            state: state_rx,
            log: log.clone(),
            events: events_tx.clone(),
        };
        let controller = Self {
            config,
            connector,
            capture: Some(capture),
            starting: None,
            generation: 0,
            playback,
            commands: commands_rx,
            state: state_tx,
            log,
            events: events_tx,
            transport: None,
            chunks: None,
            capturing: false,
        };
        (controller, handle)
    }

    /// Creates a controller and runs it on a new task.
    pub fn spawn(
        config: Arc<SessionConfig>,
        connector: Arc<dyn Connector>,
        capture: Box<dyn AudioCapture>,
        playback: Arc<dyn AudioPlayback>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(config, connector, capture, playback);
        (handle, tokio::spawn(controller.run()))
    }

    /// The controller's event loop. Returns after `shutdown` or once every
    /// handle has been dropped, leaving no session behind.
    #[instrument(name = "session_controller", skip_all, fields(agent_id = %self.config.agent_id))]
    pub async fn run(mut self) {
        info!("Session controller started.");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = next_transport_event(&mut self.transport) => {
                    self.handle_transport_event(event).await;
                },
                started = next_capture_start(&mut self.starting) => {
                    self.starting = None;
                    self.on_capture_started(started);
                },
                chunk = next_chunk(&mut self.chunks) => match chunk {
                    Some(chunk) => self.forward_chunk(chunk),
                    None => {
                        debug!("Capture stopped delivering chunks.");
                        self.chunks = None;
                    }
                },
            }
        }
        self.teardown();
        self.release_pending_capture().await;
        info!("Session controller stopped.");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        debug!(?command, state = %self.current_state(), "Handling command");
        match command {
            SessionCommand::Connect => self.connect(),
            SessionCommand::Disconnect => self.disconnect(),
            SessionCommand::Toggle => {
                if self.current_state().is_active() {
                    self.disconnect();
                } else {
                    self.connect();
                }
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn connect(&mut self) {
        if self.current_state().is_active() {
            debug!("Ignoring connect, a session is already active.");
            return;
        }
        self.generation += 1;
        self.set_state(SessionState::Connecting);

        let address = self.config.talk_url();
        info!(%address, "Opening transport.");
        self.transport = Some(self.connector.open(&address));

        // Capture starts alongside the connection attempt; chunks that arrive
        // before the socket opens are dropped.
        self.start_capture();
    }

    /// Starts capture on its own task. Acquiring the microphone may wait on
    /// the user, and the loop keeps serving the transport and commands
    /// meanwhile.
    fn start_capture(&mut self) {
        let Some(mut capture) = self.capture.take() else {
            if self.starting.is_none() {
                self.report_error(
                    "Error accessing microphone: capture is no longer available".to_string(),
                );
            } else {
                debug!("Capture start deferred until the previous start settles.");
            }
            return;
        };
        let generation = self.generation;
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CAPACITY);
        self.starting = Some(tokio::spawn(async move {
            let result = capture.start(chunk_tx).await;
            CaptureStart {
                capture,
                generation,
                chunks: chunk_rx,
                result,
            }
        }));
    }

    fn on_capture_started(&mut self, started: Result<CaptureStart, JoinError>) {
        let CaptureStart {
            mut capture,
            generation,
            chunks,
            result,
        } = match started {
            Ok(started) => started,
            Err(e) => {
                self.report_error(format!("Error accessing microphone: {}", e));
                return;
            }
        };

        let current = generation == self.generation && self.current_state().is_active();
        match result {
            Ok(()) if current => {
                info!("Microphone capture started.");
                self.chunks = Some(chunks);
                self.capturing = true;
            }
            Ok(()) => {
                debug!(generation, "Capture started after its session ended, stopping it.");
                capture.stop();
            }
            Err(e) if current => self.report_error(format!("Error accessing microphone: {}", e)),
            Err(e) => debug!(generation, error = %e, "Ignoring capture failure of an ended session"),
        }
        self.capture = Some(capture);

        // A newer session may have been waiting for the device.
        if !current && self.current_state().is_active() {
            self.start_capture();
        }
    }

    /// Settles a start still in flight when the controller stops.
    async fn release_pending_capture(&mut self) {
        let Some(task) = self.starting.take() else {
            return;
        };
        if !task.is_finished() {
            // Dropping the start future releases whatever it acquired.
            task.abort();
            return;
        }
        if let Ok(mut started) = task.await {
            if started.result.is_ok() {
                started.capture.stop();
            }
            self.capture = Some(started.capture);
        }
    }

    fn disconnect(&mut self) {
        if !self.current_state().is_active() {
            debug!("Ignoring disconnect, no active session.");
            return;
        }
        info!("Disconnecting.");
        self.teardown();
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text).await,
            TransportEvent::Closed { error } => {
                match error {
                    Some(e) => self.report_error(format!("Connection closed with error: {}", e)),
                    None => info!("Connection closed by remote."),
                }
                self.teardown();
            }
        }
    }

    fn on_open(&mut self) {
        if self.current_state() != SessionState::Connecting {
            warn!(state = %self.current_state(), "Ignoring unexpected transport open.");
            return;
        }
        self.set_state(SessionState::Connected);
        info!("Transport open, sending setup.");
        let setup = self.config.setup_frame();
        self.send_frame(&setup);
    }

    async fn on_message(&mut self, text: &str) {
        let frame = match InboundFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping inbound message that is not a typed JSON frame.");
                return;
            }
        };
        debug!(kind = %frame.kind, "Received message");

        if frame.is_audio_stream() {
            match frame.audio_data() {
                Some(data) => {
                    debug!(preview = %preview(data), "Received audio data");
                    self.schedule_playback(data.to_string());
                }
                None => warn!("audioStream frame without string data, nothing to play."),
            }
        }

        self.log.write().await.push(frame.clone());
        let _ = self.events.send(SessionEvent::Message(frame));
    }

    fn schedule_playback(&self, data: String) {
        let playback = Arc::clone(&self.playback);
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = playback.play(&data).await {
                error!(error = %e, "Dropping audio chunk.");
                let _ = events.send(SessionEvent::Error(e.to_string()));
            }
        });
    }

    fn forward_chunk(&mut self, chunk: AudioChunk) {
        if !self.current_state().can_send() {
            trace!(bytes = chunk.len(), "Dropping audio chunk, not connected.");
            return;
        }
        let frame = ClientFrame::AudioIn {
            data: chunk.to_base64(),
        };
        self.send_frame(&frame);
    }

    fn send_frame(&self, frame: &ClientFrame) {
        let Some(transport) = &self.transport else {
            return;
        };
        match transport.send(frame) {
            Ok(true) => {}
            Ok(false) => debug!("Frame dropped by closed transport."),
            Err(e) => error!(error = %e, "Failed to send frame."),
        }
    }

    /// Ends the current session, if any. Safe to call repeatedly.
    fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.chunks = None;
        if self.capturing {
            if let Some(capture) = self.capture.as_mut() {
                capture.stop();
            }
            self.capturing = false;
            info!("Microphone capture stopped.");
        }
        self.set_state(SessionState::Disconnected);
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            info!(state = %next, "Session state changed");
            let _ = self.events.send(SessionEvent::StateChanged(next));
        }
    }

    fn report_error(&self, message: String) {
        error!("{}", message);
        let _ = self.events.send(SessionEvent::Error(message));
    }
}

/// Resolves to the next event of the active transport, or never.
async fn next_transport_event(transport: &mut Option<TransportHandle>) -> TransportEvent {
    match transport {
        Some(handle) => match handle.next_event().await {
            Some(event) => event,
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

/// Resolves once the pending capture start settles, or never.
async fn next_capture_start(
    starting: &mut Option<JoinHandle<CaptureStart>>,
) -> Result<CaptureStart, JoinError> {
    match starting {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

/// Resolves to the next captured chunk, `None` once capture hangs up, or
/// never while nothing is capturing.
async fn next_chunk(chunks: &mut Option<mpsc::Receiver<AudioChunk>>) -> Option<AudioChunk> {
    match chunks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn preview(data: &str) -> String {
    let head: String = data.chars().take(50).collect();
    if head.len() < data.len() {
        format!("{}...", head)
    } else {
        head
    }
}
