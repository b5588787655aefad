use super::*;
use axum::{
    body,
    body::Body,
    http::{Request, StatusCode},
};
use futures::{SinkExt, StreamExt};
use shared::{
    domain::ParticipantId,
    error::ErrorCode,
    protocol::{ClientRequest, OutboundMessage, RelayEvent},
};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type TestClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay(max_message_bytes: usize) -> String {
    let app = build_router(Arc::new(AppState::new(64, max_message_bytes)));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("ws://{addr}/ws")
}

async fn connect(url: &str) -> TestClient {
    let (client, _) = connect_async(url).await.expect("connect");
    client
}

async fn next_event(client: &mut TestClient) -> RelayEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for relay frame")
            .expect("stream open")
            .expect("frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("relay event");
        }
    }
}

async fn send_text(client: &mut TestClient, text: &str, origin_id: Option<ParticipantId>) {
    let request = ClientRequest::SendMessage(OutboundMessage {
        text: text.to_string(),
        origin_id,
    });
    client
        .send(Message::Text(serde_json::to_string(&request).expect("json")))
        .await
        .expect("send");
}

async fn expect_connected(client: &mut TestClient) -> ParticipantId {
    match next_event(client).await {
        RelayEvent::Connected { identity } => identity,
        other => panic!("expected connected, got {other:?}"),
    }
}

async fn expect_joined(client: &mut TestClient) -> ParticipantId {
    match next_event(client).await {
        RelayEvent::ParticipantJoined { notice, identity } => {
            assert_eq!(notice, relay::join_notice(&identity));
            identity
        }
        other => panic!("expected join notice, got {other:?}"),
    }
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_router(Arc::new(AppState::new(8, 1024)));
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[test]
fn parse_request_rejects_blank_oversized_and_malformed_frames() {
    let blank = serde_json::to_string(&ClientRequest::SendMessage(OutboundMessage {
        text: "  ".to_string(),
        origin_id: None,
    }))
    .expect("json");
    let err = relay::parse_request(&blank, 1024).expect_err("blank");
    assert!(matches!(err.code, ErrorCode::Validation));

    let err = relay::parse_request(&blank, 4).expect_err("too large");
    assert!(matches!(err.code, ErrorCode::PayloadTooLarge));

    let err = relay::parse_request("{\"type\":\"nope\"}", 1024).expect_err("malformed");
    assert!(matches!(err.code, ErrorCode::Validation));
}

#[test]
fn parse_request_accepts_unassigned_origin() {
    let raw = r#"{"type":"send_message","payload":{"text":"hi","origin_id":null}}"#;
    let message = relay::parse_request(raw, 1024).expect("valid");
    assert_eq!(message.text, "hi");
    assert!(message.is_unassigned_origin());
}

#[tokio::test]
async fn assigns_identity_and_fans_out_join_message_and_leave() {
    let url = spawn_relay(1024).await;

    let mut alice = connect(&url).await;
    let alice_id = expect_connected(&mut alice).await;
    assert_eq!(expect_joined(&mut alice).await, alice_id);

    let mut bob = connect(&url).await;
    let bob_id = expect_connected(&mut bob).await;
    assert_ne!(alice_id, bob_id);
    assert_eq!(expect_joined(&mut bob).await, bob_id);
    assert_eq!(expect_joined(&mut alice).await, bob_id);

    send_text(&mut alice, "hi", None).await;
    for client in [&mut alice, &mut bob] {
        match next_event(client).await {
            RelayEvent::MessageReceived { text, sender } => {
                assert_eq!(text, "hi");
                assert_eq!(sender, alice_id);
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    bob.close(None).await.expect("close");
    match next_event(&mut alice).await {
        RelayEvent::ParticipantLeft { notice, identity } => {
            assert_eq!(identity, bob_id);
            assert_eq!(notice, relay::leave_notice(&bob_id));
        }
        other => panic!("expected leave notice, got {other:?}"),
    }
}

#[tokio::test]
async fn claimed_origin_is_replaced_by_connection_identity() {
    let url = spawn_relay(1024).await;
    let mut client = connect(&url).await;
    let identity = expect_connected(&mut client).await;
    expect_joined(&mut client).await;

    send_text(&mut client, "spoof", Some(ParticipantId::from("someone-else"))).await;

    match next_event(&mut client).await {
        RelayEvent::MessageReceived { sender, .. } => assert_eq!(sender, identity),
        other => panic!("expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_requests_get_error_only_on_that_socket() {
    let url = spawn_relay(1024).await;
    let mut client = connect(&url).await;
    expect_connected(&mut client).await;
    expect_joined(&mut client).await;

    send_text(&mut client, "   ", None).await;

    match next_event(&mut client).await {
        RelayEvent::Error(err) => assert!(matches!(err.code, ErrorCode::Validation)),
        other => panic!("expected error, got {other:?}"),
    }

    send_text(&mut client, "still here", None).await;
    assert!(matches!(
        next_event(&mut client).await,
        RelayEvent::MessageReceived { .. }
    ));
}
