//! Drives [`WsTransport`] against an in-process WebSocket server that plays
//! the vehicle.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use teleop_middleware::codec::{InboundEvent, Outbound, decode_inbound, encode_outbound};
use teleop_middleware::{LinkFrame, Transport, WsTransport};
use teleop_types::{ControlCommand, TeleopError};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Accept one client, push a ping, then forward every text frame the client
/// sends to `seen`. The server closes after the first `pong`.
async fn spawn_vehicle() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();

        tx.send(Message::Text(r#"{"event":"ping"}"#.into())).await.unwrap();

        while let Some(Ok(msg)) = rx.next().await {
            if let Message::Text(text) = msg {
                let text = text.as_str().to_owned();
                let done = text.contains("pong");
                let _ = seen_tx.send(text);
                if done {
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    (addr, seen_rx)
}

#[tokio::test]
async fn ws_transport_round_trip_and_close() {
    let (addr, mut seen) = spawn_vehicle().await;
    let mut transport = WsTransport::new(format!("ws://{addr}"));
    transport.open().await.expect("connect");
    assert!(transport.is_open());

    // The vehicle greets with a heartbeat.
    let frame = transport.next_frame().await.expect("frame").expect("ok");
    let LinkFrame::Text(text) = frame else {
        panic!("expected a text frame");
    };
    assert_eq!(decode_inbound(&text, Utc::now()).unwrap(), InboundEvent::Ping);

    let drive =
        encode_outbound(&Outbound::from(ControlCommand::Movement { x: 0.0, y: 1.0 })).unwrap();
    transport.send_text(drive.clone()).await.unwrap();
    transport
        .send_text(encode_outbound(&Outbound::Pong).unwrap())
        .await
        .unwrap();

    assert_eq!(seen.recv().await.as_deref(), Some(drive.as_str()));
    assert_eq!(seen.recv().await.as_deref(), Some(r#"{"event":"pong"}"#));

    // Server hangs up after the pong: the transport reports closure.
    loop {
        match transport.next_frame().await {
            Some(Ok(LinkFrame::Activity)) => continue,
            Some(Ok(LinkFrame::Text(text))) => panic!("unexpected frame {text}"),
            Some(Err(_)) | None => break,
        }
    }
    assert!(!transport.is_open());
}

#[tokio::test]
async fn ws_transport_gives_up_on_a_peer_that_stops_reading() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Complete the handshake, then never read again.
        let _ws = accept_async(stream).await.unwrap();
        let _ = release_rx.await;
    });

    let mut transport =
        WsTransport::new(format!("ws://{addr}")).with_io_timeout(Duration::from_millis(200));
    transport.open().await.expect("connect");

    let chunk = "x".repeat(1 << 20);
    let started = std::time::Instant::now();
    let mut outcome = Ok(());
    for _ in 0..256 {
        outcome = transport.send_text(chunk.clone()).await;
        if outcome.is_err() {
            break;
        }
    }
    assert_eq!(outcome, Err(TeleopError::Timeout(200)));
    assert!(!transport.is_open());
    assert!(started.elapsed() < Duration::from_secs(30));

    // Closing an already dropped link returns at once.
    transport.close().await;
    let _ = release_tx.send(());
}
