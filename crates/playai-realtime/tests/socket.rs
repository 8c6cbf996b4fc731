use futures_util::{SinkExt, StreamExt};
use playai_realtime::PlayAiConnector;
use playtalk_core::{
    SessionConfig,
    protocol::ClientFrame,
    transport::{Connector, TransportEvent},
};
use std::time::Duration;
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

/// What the fake service observed from the client.
#[derive(Debug, PartialEq)]
enum Seen {
    Text(String),
    Closed,
}

/// Accepts one WebSocket client, greets it with `greeting`, and reports every
/// frame it receives.
async fn fake_service(greeting: Vec<&'static str>) -> (String, mpsc::UnboundedReceiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for text in greeting {
            ws.send(Message::Text(text.into())).await.unwrap();
        }
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    let _ = seen_tx.send(Seen::Text(text.to_string()));
                }
                Message::Close(_) => {
                    let _ = seen_tx.send(Seen::Closed);
                    break;
                }
                _ => {}
            }
        }
    });

    (format!("ws://{}", addr), seen_rx)
}

#[tokio::test]
async fn test_opened_precedes_messages_and_frames_reach_service() {
    let (base, mut seen) = fake_service(vec![
        r#"{"type":"init"}"#,
        r#"{"type":"audioStream","data":"QQ=="}"#,
    ])
    .await;
    let config = SessionConfig::new("agent-1", "k1").with_base_url(base);

    let mut handle = PlayAiConnector::new().open(&config.talk_url());

    let first = timeout(WAIT, handle.next_event()).await.unwrap();
    assert_eq!(first, Some(TransportEvent::Opened));
    assert!(handle.is_open());

    assert!(handle.send(&config.setup_frame()).unwrap());
    let setup = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(setup, Seen::Text(r#"{"type":"setup","apiKey":"k1"}"#.to_string()));

    let second = timeout(WAIT, handle.next_event()).await.unwrap();
    assert_eq!(
        second,
        Some(TransportEvent::Message(r#"{"type":"init"}"#.to_string()))
    );
    let third = timeout(WAIT, handle.next_event()).await.unwrap();
    assert_eq!(
        third,
        Some(TransportEvent::Message(
            r#"{"type":"audioStream","data":"QQ=="}"#.to_string()
        ))
    );

    let audio = ClientFrame::AudioIn {
        data: "UklGRg==".to_string(),
    };
    assert!(handle.send(&audio).unwrap());
    let sent = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    match sent {
        Seen::Text(text) => {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "audioIn");
            assert_eq!(value["data"], "UklGRg==");
        }
        other => panic!("Expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_is_idempotent_and_sends_close_frame() {
    let (base, mut seen) = fake_service(vec![]).await;
    let mut handle = PlayAiConnector::new().open(&format!("{}/v1/talk/a", base));

    assert_eq!(
        timeout(WAIT, handle.next_event()).await.unwrap(),
        Some(TransportEvent::Opened)
    );

    handle.close();
    handle.close();
    assert!(!handle.is_open());

    let frame = ClientFrame::AudioIn {
        data: "QQ==".to_string(),
    };
    assert!(!handle.send(&frame).unwrap());
    assert_eq!(timeout(WAIT, seen.recv()).await.unwrap(), Some(Seen::Closed));
}

#[tokio::test]
async fn test_remote_close_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let mut handle = PlayAiConnector::new().open(&format!("ws://{}/v1/talk/a", addr));
    assert_eq!(
        timeout(WAIT, handle.next_event()).await.unwrap(),
        Some(TransportEvent::Opened)
    );
    assert_eq!(
        timeout(WAIT, handle.next_event()).await.unwrap(),
        Some(TransportEvent::Closed { error: None })
    );
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_connect_failure_surfaces_as_closed_with_error() {
    // Grab a free port and release it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut handle = PlayAiConnector::new().open(&format!("ws://{}/v1/talk/a", addr));
    match timeout(WAIT, handle.next_event()).await.unwrap() {
        Some(TransportEvent::Closed { error }) => assert!(error.is_some()),
        other => panic!("Expected Closed, got {:?}", other),
    }
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_binary_messages_are_read_as_text_when_utf8() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Binary(br#"{"type":"fromBinary"}"#.to_vec().into()))
            .await
            .unwrap();
        ws.send(Message::Binary(vec![0xff, 0xfe, 0x00].into()))
            .await
            .unwrap();
        ws.send(Message::Text(r#"{"type":"afterBinary"}"#.into()))
            .await
            .unwrap();
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let mut handle = PlayAiConnector::new().open(&format!("ws://{}/v1/talk/a", addr));
    let mut events = Vec::new();
    while let Some(event) = timeout(WAIT, handle.next_event()).await.unwrap() {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            TransportEvent::Opened,
            TransportEvent::Message(r#"{"type":"fromBinary"}"#.to_string()),
            TransportEvent::Message(r#"{"type":"afterBinary"}"#.to_string()),
            TransportEvent::Closed { error: None },
        ]
    );
}
