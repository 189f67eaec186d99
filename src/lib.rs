//! Trailmap - streaming career-roadmap toolkit
//!
//! Two halves share one streaming vocabulary:
//!
//! - The **client core** ([`framing`], [`sse`], [`delta`], [`session`],
//!   [`chat`], [`autosave`], [`roadmap`]) consumes an SSE chat-completion
//!   stream incrementally: line framing across arbitrary chunk boundaries,
//!   per-line event decoding, monotonic delta accumulation, observable
//!   progress, and debounced persistence of finished conversations.
//! - The **gateway** ([`handlers`], [`prompt`], [`target`], [`auth`]) fronts
//!   the upstream AI provider for the roadmap-generation, roadmap-chat and
//!   assistant features, relaying the provider's SSE body verbatim.

use axum::Router;
use axum::routing::post;
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use tracing::{info, instrument};

pub mod auth;
pub mod autosave;
pub mod chat;
pub mod client;
pub mod delta;
pub mod framing;
pub mod handlers;
pub mod prompt;
pub mod roadmap;
pub mod session;
pub mod sse;
pub mod store;
pub mod target;

use auth::KeySet;
use client::{HttpClient, HyperClient};
use handlers::{advise_electives, assistant, chat_roadmap, generate_roadmap};
use target::UpstreamTarget;

/// The gateway application state: HTTP client, upstream target, and the
/// publishable keys accepted on this surface.
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub upstream: UpstreamTarget,
    pub keys: KeySet,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(upstream: UpstreamTarget, keys: KeySet) -> Self {
        let http_client = client::create_hyper_client();
        Self {
            http_client,
            upstream,
            keys,
        }
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(upstream: UpstreamTarget, keys: KeySet, http_client: T) -> Self {
        Self {
            http_client,
            upstream,
            keys,
        }
    }
}

/// Build the gateway router:
/// - `/v1/roadmaps/generate` - stream a fresh career roadmap
/// - `/v1/roadmaps/chat` - stream a follow-up answer about a roadmap
/// - `/v1/assistant` - stream a general assistant reply
/// - `/v1/electives/advice` - single-shot structured electives recommendation
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route("/v1/roadmaps/generate", post(generate_roadmap))
        .route("/v1/roadmaps/chat", post(chat_roadmap))
        .route("/v1/assistant", post(assistant))
        .route("/v1/electives/advice", post(advise_electives))
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}

/// Test doubles shared by unit and integration tests.
pub mod test_utils {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::{Arc, Mutex};

    pub struct MockHttpClient {
        pub requests: Arc<Mutex<Vec<MockRequest>>>,
        response_builder: Arc<dyn Fn() -> axum::response::Response + Send + Sync>,
    }

    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub method: String,
        pub uri: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl MockHttpClient {
        pub fn new(status: StatusCode, body: &str) -> Self {
            let body = body.to_string();
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || {
                    axum::response::Response::builder()
                        .status(status)
                        .body(axum::body::Body::from(body.clone()))
                        .unwrap()
                }),
            }
        }

        /// A mock upstream that streams canned SSE chunks, one per read.
        pub fn new_streaming(status: StatusCode, chunks: Vec<String>) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || {
                    use axum::body::Body;
                    use futures_util::stream;

                    let stream = stream::iter(
                        chunks
                            .clone()
                            .into_iter()
                            .map(|chunk| Ok::<_, std::io::Error>(chunk.into_bytes())),
                    );

                    axum::response::Response::builder()
                        .status(status)
                        .header("content-type", "text/event-stream")
                        .header("cache-control", "no-cache")
                        .body(Body::from_stream(stream))
                        .unwrap()
                }),
            }
        }

        pub fn get_requests(&self) -> Vec<MockRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl std::fmt::Debug for MockHttpClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockHttpClient")
                .field("requests", &self.requests)
                .field("response_builder", &"<closure>")
                .finish()
        }
    }

    impl Clone for MockHttpClient {
        fn clone(&self) -> Self {
            Self {
                requests: Arc::clone(&self.requests),
                response_builder: Arc::clone(&self.response_builder),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            req: axum::extract::Request,
        ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
            let method = req.method().to_string();
            let uri = req.uri().to_string();
            let headers = req
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();

            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
                .to_vec();

            self.requests.lock().unwrap().push(MockRequest {
                method,
                uri,
                headers,
                body,
            });

            Ok((self.response_builder)())
        }
    }
}
