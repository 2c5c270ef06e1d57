use super::{TransportEvent, open};
use crate::testing::{MockServer, unused_port};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_open_send_receive_and_close() {
    let server = MockServer::bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = open(server.address(), 7, tx);
    let mut peer = server.accept().await;

    let connection = match next_event(&mut rx).await {
        TransportEvent::Opened {
            generation,
            connection,
        } => {
            assert_eq!(generation, 7);
            connection
        }
        other => panic!("Expected Opened, got {other:?}"),
    };

    connection.send(r#"{"hb":{}}"#.to_string()).unwrap();
    assert_eq!(peer.recv().await, json!({ "hb": {} }));

    peer.send(json!({ "hbAck": {} })).await;
    match next_event(&mut rx).await {
        TransportEvent::Message { generation, text } => {
            assert_eq!(generation, 7);
            assert_eq!(text, r#"{"hbAck":{}}"#);
        }
        other => panic!("Expected Message, got {other:?}"),
    }

    peer.close().await;
    match next_event(&mut rx).await {
        TransportEvent::Closed { generation } => assert_eq!(generation, 7),
        other => panic!("Expected Closed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_close_reaches_server() {
    let server = MockServer::bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = open(server.address(), 1, tx);
    let mut peer = server.accept().await;

    let TransportEvent::Opened { connection, .. } = next_event(&mut rx).await else {
        panic!("Expected Opened");
    };
    connection.close();
    peer.expect_closed().await;
}

#[tokio::test]
async fn test_open_failure_reports_closed() {
    let port = unused_port().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = open(format!("ws://127.0.0.1:{port}/"), 3, tx);

    let event = next_event(&mut rx).await;
    assert!(matches!(event, TransportEvent::Closed { generation: 3 }));
}
