//! End-to-end feed client tests against an in-process websocket server.

use {
    futures::{SinkExt, StreamExt},
    mempool_feed::{ConnectionState, FeedClient, FeedConfig, FeedEvent},
    std::time::Duration,
    tokio::{net::TcpListener, sync::mpsc},
    tokio_tungstenite::{accept_async, tungstenite::Message},
};

const PUSH_FRAME: &str = r#"{
    "method": "subscribe",
    "params": {
        "subscription": "0xabc",
        "result": {
            "txHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "txContents": {
                "from": "0x00000000000000000000000000000000000000aa",
                "to": "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
                "value": "0x16345785d8a0000",
                "input": "0x38ed1739",
                "gas": "0x30d40",
                "gasPrice": "0x4a817c800",
                "nonce": "0x7",
                "chainId": "0x1"
            }
        }
    }
}"#;

fn config(port: u16) -> FeedConfig {
    serde_json::from_value(serde_json::json!({
        "url": format!("ws://127.0.0.1:{port}/"),
        "auth-token": "secret",
        "chains": [1],
        "reconnect": {
            "base-interval": "50ms",
            "multiplier": 1.0,
            "max-attempts": 5
        }
    }))
    .unwrap()
}

fn watch_events(client: &FeedClient) -> mpsc::UnboundedReceiver<FeedEvent> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    client.subscribe_events(move |event| {
        let _ = events_tx.send(event.clone());
    });
    events_rx
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<FeedEvent>) -> FeedEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream ended")
}

#[tokio::test]
async fn connect_subscribe_and_receive_pending_tx() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // First inbound frame must be the subscribe request.
        let subscribe = ws.next().await.unwrap().unwrap();
        let subscribe: serde_json::Value =
            serde_json::from_str(subscribe.to_text().unwrap()).unwrap();
        assert_eq!(subscribe["method"], "subscribe");
        assert_eq!(subscribe["params"]["authorization"], "secret");
        assert_eq!(subscribe["params"]["chains"][0], "0x1");

        ws.send(Message::Text(r#"{"id": 1, "result": "0xsub"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(PUSH_FRAME.into())).await.unwrap();
        // Keep the connection open.
        while ws.next().await.is_some() {}
    });

    let client = FeedClient::new(config(port));
    let mut events = watch_events(&client);

    client.connect().await.unwrap();
    // connect() while connected is a no-op.
    client.connect().await.unwrap();
    client.subscribe_pending_txs().unwrap();

    assert!(matches!(next_event(&mut events).await, FeedEvent::Connected));
    let FeedEvent::PendingTx(tx) = next_event(&mut events).await else {
        panic!("expected a pending transaction event");
    };
    assert_eq!(tx.chain_id, 1);
    assert_eq!(tx.nonce, 7);
    assert_eq!(tx.input.len(), 4);

    let health = client.health();
    assert_eq!(health.state, ConnectionState::Connected);
    assert!(health.messages_received >= 2);
    assert_eq!(health.transactions_emitted, 1);
    assert!(health.uptime.is_some());

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        // First connection gets dropped right away.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
        // Second connection stays up.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let client = FeedClient::new(config(port));
    let mut events = watch_events(&client);
    client.connect().await.unwrap();

    assert!(matches!(next_event(&mut events).await, FeedEvent::Connected));
    assert!(matches!(
        next_event(&mut events).await,
        FeedEvent::Disconnected { .. }
    ));
    assert!(matches!(next_event(&mut events).await, FeedEvent::Connected));

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.health().reconnect_count, 1);
    client.disconnect();
}

#[tokio::test]
async fn disconnect_cancels_pending_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
        // Count any further connection attempts.
        let mut extra_connections = 0;
        loop {
            match tokio::time::timeout(Duration::from_millis(500), listener.accept()).await {
                Ok(Ok(_)) => extra_connections += 1,
                _ => break,
            }
        }
        extra_connections
    });

    let client = FeedClient::new(config(port));
    let mut events = watch_events(&client);
    client.connect().await.unwrap();
    assert!(matches!(next_event(&mut events).await, FeedEvent::Connected));
    assert!(matches!(
        next_event(&mut events).await,
        FeedEvent::Disconnected { .. }
    ));

    // The reconnect timer is pending now; disconnect must cancel it.
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let extra_connections = server.await.unwrap();
    assert_eq!(extra_connections, 0, "cancelled timer must not reconnect");
}
