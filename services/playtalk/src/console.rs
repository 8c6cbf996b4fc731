//! Line-oriented terminal presentation of a session.
//!
//! Pressing Enter is the connect/disconnect button. Events from the
//! controller are printed as they happen, interleaved with command output.

use playtalk_core::{InboundFrame, SessionEvent, SessionHandle, SessionState};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub const CONNECT_LABEL: &str = "Connect to Play.ai";
pub const DISCONNECT_LABEL: &str = "Disconnect";

const HELP: &str = "Commands: <Enter> or c = connect/disconnect, l = list messages, q = quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Toggle,
    List,
    Quit,
}

impl ConsoleCommand {
    /// Parses one input line. Unknown input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "c" | "connect" | "disconnect" => Some(Self::Toggle),
            "l" | "list" => Some(Self::List),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// What the single button offers in a given state.
pub fn button_label(state: SessionState) -> &'static str {
    if state.is_active() {
        DISCONNECT_LABEL
    } else {
        CONNECT_LABEL
    }
}

pub fn status_line(state: SessionState) -> String {
    format!("[{}] press Enter to {}", state, button_label(state))
}

/// Renders one logged frame. Audio payloads are summarised, everything else
/// is pretty-printed as received.
pub fn render_frame(index: usize, frame: &InboundFrame) -> String {
    if let Some(data) = frame.audio_data() {
        return format!("#{} {} ({} base64 chars)", index, frame.kind, data.len());
    }
    let body = serde_json::to_string_pretty(frame).unwrap_or_else(|_| format!("{:?}", frame));
    format!("#{} {}", index, body)
}

pub fn render_event(event: &SessionEvent, log_len: usize) -> String {
    match event {
        SessionEvent::StateChanged(state) => status_line(*state),
        SessionEvent::Message(frame) => render_frame(log_len, frame),
        SessionEvent::Error(message) => format!("error: {}", message),
    }
}

/// Numbers live messages by their position in the message log.
struct LiveNumbering {
    logged: usize,
}

impl LiveNumbering {
    async fn new(handle: &SessionHandle) -> Self {
        Self {
            logged: handle.messages().await.len(),
        }
    }

    /// Renders one broadcast event. Missed events are skipped and the count
    /// is taken from the log again, so `#N` keeps matching what `l` prints.
    async fn render(
        &mut self,
        handle: &SessionHandle,
        event: Result<SessionEvent, RecvError>,
    ) -> Option<String> {
        match event {
            Ok(event) => {
                if matches!(event, SessionEvent::Message(_)) {
                    self.logged += 1;
                }
                Some(render_event(&event, self.logged))
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Console fell behind session events");
                self.logged = handle.messages().await.len();
                None
            }
            Err(RecvError::Closed) => None,
        }
    }
}

/// Drives the session from `input` until it ends or `q` is entered.
pub async fn run<R, W>(handle: &SessionHandle, input: R, mut out: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut events = handle.subscribe();
    let mut numbering = LiveNumbering::new(handle).await;

    write_line(&mut out, HELP).await?;
    write_line(&mut out, &status_line(handle.state())).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Console input closed");
                    break;
                };
                match ConsoleCommand::parse(&line) {
                    Some(ConsoleCommand::Toggle) => handle.toggle().await?,
                    Some(ConsoleCommand::List) => {
                        let messages = handle.messages().await;
                        if messages.is_empty() {
                            write_line(&mut out, "No messages yet.").await?;
                        }
                        for (index, frame) in messages.iter().enumerate() {
                            write_line(&mut out, &render_frame(index + 1, frame)).await?;
                        }
                    }
                    Some(ConsoleCommand::Quit) => break,
                    None => write_line(&mut out, HELP).await?,
                }
            }
            event = events.recv() => {
                if matches!(event, Err(RecvError::Closed)) {
                    break;
                }
                if let Some(line) = numbering.render(handle, event).await {
                    write_line(&mut out, &line).await?;
                }
            }
        }
    }
    out.flush().await?;
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use playtalk_core::{
        AudioCapture, AudioChunk, AudioError, AudioPlayback, Connector, SessionConfig,
        SessionController, TransportEvent, TransportHandle, TransportPeer,
    };
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct HeldConnector {
        peers: Mutex<Vec<TransportPeer>>,
    }

    impl Connector for HeldConnector {
        fn open(&self, _address: &str) -> TransportHandle {
            let (handle, peer) = TransportHandle::pair(8);
            self.peers.lock().unwrap().push(peer);
            handle
        }
    }

    struct SilentCapture;

    #[async_trait]
    impl AudioCapture for SilentCapture {
        async fn start(&mut self, _sink: mpsc::Sender<AudioChunk>) -> Result<(), AudioError> {
            Ok(())
        }

        fn stop(&mut self) {}
    }

    struct NullPlayback;

    #[async_trait]
    impl AudioPlayback for NullPlayback {
        async fn play(&self, _data: &str) -> Result<(), AudioError> {
            Ok(())
        }
    }

    fn spawn_session() -> (SessionHandle, tokio::task::JoinHandle<()>) {
        SessionController::spawn(
            Arc::new(SessionConfig::new("agent", "key")),
            Arc::new(HeldConnector::default()),
            Box::new(SilentCapture),
            Arc::new(NullPlayback),
        )
    }

    fn frame(json: &str) -> InboundFrame {
        InboundFrame::from_json(json).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse(""), Some(ConsoleCommand::Toggle));
        assert_eq!(ConsoleCommand::parse("  C "), Some(ConsoleCommand::Toggle));
        assert_eq!(ConsoleCommand::parse("l"), Some(ConsoleCommand::List));
        assert_eq!(ConsoleCommand::parse("quit"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("hello"), None);
    }

    #[test]
    fn test_button_label_follows_activity() {
        assert_eq!(button_label(SessionState::Disconnected), "Connect to Play.ai");
        assert_eq!(button_label(SessionState::Connecting), "Disconnect");
        assert_eq!(button_label(SessionState::Connected), "Disconnect");
    }

    #[test]
    fn test_render_frame_pretty_prints_unknown_types() {
        let rendered = render_frame(2, &frame(r#"{"type":"voiceActivityStart","at":5}"#));
        assert!(rendered.starts_with("#2 {\n"));
        assert!(rendered.contains("\"type\": \"voiceActivityStart\""));
        assert!(rendered.contains("\"at\": 5"));
    }

    #[test]
    fn test_render_frame_summarises_audio() {
        let rendered = render_frame(1, &frame(r#"{"type":"audioStream","data":"QUJD"}"#));
        assert_eq!(rendered, "#1 audioStream (4 base64 chars)");
    }

    #[test]
    fn test_render_error_event() {
        let event = SessionEvent::Error("Error accessing microphone: denied".to_string());
        assert_eq!(
            render_event(&event, 0),
            "error: Error accessing microphone: denied"
        );
    }

    #[tokio::test]
    async fn test_list_with_empty_log_then_quit() {
        let (handle, task) = spawn_session();
        let mut out = Vec::new();

        run(&handle, &b"l\nbogus\nq\n"[..], &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[disconnected] press Enter to Connect to Play.ai"));
        assert!(text.contains("No messages yet."));
        assert_eq!(text.matches(HELP).count(), 2);
        assert_eq!(handle.state(), SessionState::Disconnected);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_enter_toggles_the_session() {
        let (handle, task) = spawn_session();
        let mut out = Vec::new();

        run(&handle, &b"\nq\n"[..], &mut out).await.unwrap();

        let mut state = handle.watch_state();
        state.wait_for(|s| s.is_active()).await.unwrap();

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_numbering_resyncs_with_log_after_lag() {
        let connector = Arc::new(HeldConnector::default());
        let (handle, task) = SessionController::spawn(
            Arc::new(SessionConfig::new("agent", "key")),
            connector.clone(),
            Box::new(SilentCapture),
            Arc::new(NullPlayback),
        );
        let mut numbering = LiveNumbering::new(&handle).await;
        let mut events = handle.subscribe();

        handle.connect().await.unwrap();
        handle.watch_state().wait_for(|s| s.is_active()).await.unwrap();
        let peer_events = connector.peers.lock().unwrap()[0].events.clone();
        peer_events.send(TransportEvent::Opened).await.unwrap();
        for kind in ["first", "second", "third"] {
            peer_events
                .send(TransportEvent::Message(format!(r#"{{"type":"{}"}}"#, kind)))
                .await
                .unwrap();
        }
        let mut seen = 0;
        while seen < 3 {
            if let SessionEvent::Message(_) = events.recv().await.unwrap() {
                seen += 1;
            }
        }

        // The three messages were never shown, as after a lagged receiver.
        assert_eq!(numbering.render(&handle, Err(RecvError::Lagged(3))).await, None);
        let next = SessionEvent::Message(frame(r#"{"type":"fourth"}"#));
        let line = numbering.render(&handle, Ok(next)).await.unwrap();
        assert!(line.starts_with("#4 "));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_end_of_input_ends_the_console() {
        let (handle, task) = spawn_session();
        let mut out = Vec::new();

        run(&handle, &b""[..], &mut out).await.unwrap();

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
