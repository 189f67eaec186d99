//! End-to-end tests: the client core consuming the gateway over a real
//! socket, and gateway-level relay behavior that needs full server setup.

use axum::http::StatusCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use trailmap::auth::{ConstantTimeString, KeySet};
use trailmap::chat::ChatMessage;
use trailmap::client::create_hyper_client;
use trailmap::prompt::{ExpertiseLevel, RoadmapContext};
use trailmap::roadmap::RoadmapClient;
use trailmap::session::{SessionError, SessionState, StreamRequest, StreamSession};
use trailmap::store::{MemoryStore, OwnerId};
use trailmap::target::UpstreamTarget;
use trailmap::test_utils::MockHttpClient;
use trailmap::{AppState, build_router};
use url::Url;

fn upstream() -> UpstreamTarget {
    UpstreamTarget::builder()
        .url("https://ai.provider.example/".parse().unwrap())
        .api_key("sk-provider".to_string())
        .model("gemini-flash")
        .build()
}

fn delta_chunk(content: &str) -> String {
    format!(
        "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n",
        serde_json::json!(content)
    )
}

/// Serve the gateway (backed by a mock upstream) on a real local socket and
/// return its base URL.
async fn spawn_gateway(mock_upstream: MockHttpClient, keys: KeySet) -> Url {
    let state = AppState::with_client(upstream(), keys, mock_upstream);
    let router = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/").parse().unwrap()
}

#[tokio::test]
async fn test_roadmap_client_streams_through_live_gateway() {
    let mock_upstream = MockHttpClient::new_streaming(
        StatusCode::OK,
        vec![
            delta_chunk("# Data Engineering Roadmap\n"),
            delta_chunk("Semester 1: "),
            delta_chunk("databases"),
            "data: [DONE]\n".to_string(),
        ],
    );
    let gateway_url = spawn_gateway(mock_upstream.clone(), KeySet::new()).await;

    let store = Arc::new(MemoryStore::new());
    let (mut client, _save_errors) = RoadmapClient::new(
        create_hyper_client(),
        gateway_url,
        None,
        Some(OwnerId("student-1".into())),
        store.clone(),
    );

    let context = RoadmapContext::builder()
        .career_path_name("Data Engineering")
        .expertise_level(ExpertiseLevel::Beginner)
        .build();
    let content = client.generate(context).await.unwrap();
    assert_eq!(content, "# Data Engineering Roadmap\nSemester 1: databases");

    // The gateway forwarded exactly one upstream request with its own key
    let upstream_requests = mock_upstream.get_requests();
    assert_eq!(upstream_requests.len(), 1);
    assert!(
        upstream_requests[0]
            .headers
            .iter()
            .any(|(k, v)| k == "authorization" && v == "Bearer sk-provider")
    );
    let forwarded: serde_json::Value =
        serde_json::from_slice(&upstream_requests[0].body).unwrap();
    assert_eq!(forwarded["stream"], true);
    assert_eq!(forwarded["model"], "gemini-flash");
}

#[tokio::test]
async fn test_chat_round_trip_persists_after_save() {
    let mock_upstream = MockHttpClient::new_streaming(
        StatusCode::OK,
        vec![delta_chunk("Take databases first."), "data: [DONE]\n".to_string()],
    );
    let gateway_url = spawn_gateway(mock_upstream, KeySet::new()).await;

    let store = Arc::new(MemoryStore::new());
    let (mut client, _save_errors) = RoadmapClient::new(
        create_hyper_client(),
        gateway_url,
        None,
        Some(OwnerId("student-1".into())),
        store.clone(),
    );

    let context = RoadmapContext::builder()
        .career_path_name("Data Engineering")
        .expertise_level(ExpertiseLevel::Intermediate)
        .build();
    client.generate(context).await.unwrap();
    let id = client.save().await.unwrap();

    client.send_chat_message("Which elective first?").await.unwrap();
    assert_eq!(
        client.messages(),
        vec![
            ChatMessage::user("Which elective first?"),
            ChatMessage::assistant("Take databases first."),
        ]
    );

    // Wait out the real debounce window, then the write must have landed
    tokio::time::sleep(trailmap::autosave::DEFAULT_DEBOUNCE + std::time::Duration::from_millis(200))
        .await;
    let record = store.get(&id).unwrap();
    assert_eq!(record.messages, client.messages());
    assert_eq!(record.owner, OwnerId("student-1".into()));
}

#[tokio::test]
async fn test_session_maps_gateway_rate_limit() {
    let mock_upstream = MockHttpClient::new(StatusCode::TOO_MANY_REQUESTS, "{}");
    let gateway_url = spawn_gateway(mock_upstream, KeySet::new()).await;

    let session = StreamSession::new();
    let request = StreamRequest::builder()
        .url(gateway_url.join("v1/roadmaps/generate").unwrap().to_string())
        .body(serde_json::json!({
            "career_path_name": "Data Engineering",
            "expertise_level": "beginner",
        }))
        .build();

    let err = session.run(&create_hyper_client(), request).await.unwrap_err();
    assert!(matches!(err, SessionError::RateLimited));
}

#[tokio::test]
async fn test_session_surfaces_gateway_error_message() {
    // Any other upstream failure is collapsed by the gateway to a generic
    // 500 whose JSON error body becomes the session failure message.
    let mock_upstream = MockHttpClient::new(StatusCode::BAD_GATEWAY, "provider detail");
    let gateway_url = spawn_gateway(mock_upstream, KeySet::new()).await;

    let session = StreamSession::new();
    let handle = session.handle();
    let request = StreamRequest::builder()
        .url(gateway_url.join("v1/assistant").unwrap().to_string())
        .body(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .build();

    let err = session.run(&create_hyper_client(), request).await.unwrap_err();
    match err {
        SessionError::RequestFailed(message) => {
            assert_eq!(message, "AI gateway error");
            assert!(!message.contains("provider detail"));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    assert_eq!(handle.latest().state, SessionState::Failed);
}

#[tokio::test]
async fn test_gateway_rejects_unknown_publishable_key_end_to_end() {
    let mock_upstream = MockHttpClient::new_streaming(
        StatusCode::OK,
        vec![delta_chunk("x"), "data: [DONE]\n".to_string()],
    );
    let mut keys = KeySet::new();
    keys.insert(ConstantTimeString::from("pk-live"));
    let gateway_url = spawn_gateway(mock_upstream.clone(), keys).await;

    let store = Arc::new(MemoryStore::new());
    let (mut client, _save_errors) = RoadmapClient::new(
        create_hyper_client(),
        gateway_url.clone(),
        Some("pk-stale".to_string()),
        None,
        store.clone(),
    );

    let context = RoadmapContext::builder()
        .career_path_name("Data Engineering")
        .expertise_level(ExpertiseLevel::Beginner)
        .build();
    let err = client.generate(context).await.unwrap_err();
    assert!(matches!(
        err,
        trailmap::roadmap::RoadmapError::Session(SessionError::RequestFailed(_))
    ));
    assert_eq!(mock_upstream.get_requests().len(), 0);

    // The right key goes through
    let (mut client, _save_errors) = RoadmapClient::new(
        create_hyper_client(),
        gateway_url,
        Some("pk-live".to_string()),
        None,
        store,
    );
    let context = RoadmapContext::builder()
        .career_path_name("Data Engineering")
        .expertise_level(ExpertiseLevel::Beginner)
        .build();
    assert_eq!(client.generate(context).await.unwrap(), "x");
}

#[tokio::test]
async fn test_relay_passes_split_payloads_through_unchanged() {
    // Split a delta payload mid-JSON across two upstream chunks. The relay
    // passes bytes through untouched and the client reassembles them.
    let payload = delta_chunk("Hello");
    let (first, second) = payload.split_at(payload.len() / 2);
    let mock_upstream = MockHttpClient::new_streaming(
        StatusCode::OK,
        vec![
            first.to_string(),
            second.to_string(),
            "data: [DONE]".to_string(),
        ],
    );
    let gateway_url = spawn_gateway(mock_upstream, KeySet::new()).await;

    let session = StreamSession::new();
    let request = StreamRequest::builder()
        .url(gateway_url.join("v1/assistant").unwrap().to_string())
        .body(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .build();

    let text = session.run(&create_hyper_client(), request).await.unwrap();
    assert_eq!(text, "Hello");
}
