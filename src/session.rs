//! Stream session controller
//!
//! A [`StreamSession`] runs one end-to-end AI request/response cycle: issue
//! the HTTP request, map failure statuses to typed signals, then pump the
//! SSE body through the framer -> decoder -> accumulator pipeline, publishing
//! every grown buffer to subscribers. The session owns its frame buffer and
//! accumulated text exclusively; a new request means a new session.
//!
//! Observers subscribe through a [`SessionHandle`] (a `tokio::sync::watch`
//! receiver plus a cancellation token), so the UI can render progressively
//! and cancel without touching the read loop.

use crate::client::HttpClient;
use crate::delta::{Accumulation, DeltaAccumulator};
use crate::framing::LineFramer;
use crate::sse::{SseLine, decode_line};
use axum::body::Body;
use axum::http::{Method, header};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Typed outcomes of a failed session, per the upstream status contract.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// 429 from the upstream; recoverable, the caller decides when to retry.
    #[error("rate limited, try again later")]
    RateLimited,
    /// 402 from the upstream; recoverable via external (billing) action.
    #[error("payment required")]
    PaymentRequired,
    /// Any other non-success status, with the upstream's message if it sent
    /// a JSON `error` body.
    #[error("request failed: {0}")]
    RequestFailed(String),
    /// Network failure before or while reading the body.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Pending,
    Streaming,
    Completed,
    Failed,
}

/// Snapshot published to subscribers: the growing text plus lifecycle state.
///
/// For a given session the text is monotonic: each published value is a
/// prefix-extension of the previous one.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub state: SessionState,
    pub text: String,
}

/// One streaming request: endpoint, credentials, JSON payload.
#[derive(Debug, Clone, bon::Builder)]
pub struct StreamRequest {
    /// Full URL of the streaming endpoint.
    #[builder(into)]
    pub url: String,
    /// Bearer token presented to the endpoint.
    #[builder(into)]
    pub bearer: Option<String>,
    /// JSON request payload.
    pub body: serde_json::Value,
}

/// Caller-side view of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    updates: watch::Receiver<SessionUpdate>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Stop the session's reads. Idempotent; safe after natural completion.
    /// Content already delivered stays visible.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Subscribe to buffer/state updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionUpdate> {
        self.updates.clone()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> SessionUpdate {
        self.updates.borrow().clone()
    }
}

/// Owns one request/response cycle and its streaming pipeline.
#[derive(Debug)]
pub struct StreamSession {
    framer: LineFramer,
    accumulator: DeltaAccumulator,
    publisher: watch::Sender<SessionUpdate>,
    // Held so publishes never fail when every external handle is dropped
    _keepalive: watch::Receiver<SessionUpdate>,
    cancel: CancellationToken,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        let (publisher, keepalive) = watch::channel(SessionUpdate::default());
        Self {
            framer: LineFramer::new(),
            accumulator: DeltaAccumulator::new(),
            publisher,
            _keepalive: keepalive,
            cancel: CancellationToken::new(),
        }
    }

    /// A handle for observing and cancelling this session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            updates: self.publisher.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run the cycle to completion, returning the final accumulated text.
    ///
    /// Consumes the session: the frame buffer and text buffer belong to one
    /// request only.
    #[instrument(skip_all, fields(url = %request.url))]
    pub async fn run<T: HttpClient>(
        mut self,
        client: &T,
        request: StreamRequest,
    ) -> Result<String, SessionError> {
        let response = client
            .request(build_request(&request)?)
            .await
            .map_err(|e| self.fail(SessionError::Transport(e.to_string())))?;

        let status = response.status();
        if status == axum::http::StatusCode::TOO_MANY_REQUESTS {
            return Err(self.fail(SessionError::RateLimited));
        }
        if status == axum::http::StatusCode::PAYMENT_REQUIRED {
            return Err(self.fail(SessionError::PaymentRequired));
        }
        if !status.is_success() {
            let message = error_body_message(response.into_body(), status).await;
            return Err(self.fail(SessionError::RequestFailed(message)));
        }

        self.publish(SessionState::Streaming);
        let mut stream = response.into_body().into_data_stream();
        let mut saw_bytes = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("session cancelled, keeping partial content");
                    self.publish(SessionState::Completed);
                    return Ok(self.accumulator.into_text());
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        saw_bytes = true;
                        self.framer.feed(&bytes);
                        self.drain_lines();
                    }
                    Some(Err(e)) => {
                        return Err(self.fail(SessionError::Transport(e.to_string())));
                    }
                    None => break,
                },
            }
        }

        if !saw_bytes {
            return Err(self.fail(SessionError::RequestFailed(
                "no response body".to_string(),
            )));
        }

        self.final_flush();
        self.publish(SessionState::Completed);
        Ok(self.accumulator.into_text())
    }

    /// Process every complete line currently buffered.
    ///
    /// Stops early on the content terminator (remaining transport reads are
    /// drained but stay unprocessed until then) or when a payload needs more
    /// bytes, in which case the line goes back into the frame buffer.
    fn drain_lines(&mut self) {
        while let Some(line) = self.framer.next_line() {
            match decode_line(&line) {
                SseLine::Ignore | SseLine::Unrecognized => continue,
                SseLine::Terminator => break,
                SseLine::Data(payload) => match self.accumulator.push(&payload) {
                    Accumulation::Updated => self.publish(SessionState::Streaming),
                    Accumulation::Unchanged => {}
                    Accumulation::NeedMoreInput => {
                        self.framer.push_back(&line);
                        break;
                    }
                },
            }
        }
    }

    /// Exactly-once flush at transport EOF: the last line may have no
    /// trailing newline, including a bare `data: [DONE]`. Payloads that
    /// still do not parse here are dropped.
    fn final_flush(&mut self) {
        loop {
            let Some(line) = self.framer.next_line().or_else(|| self.framer.flush()) else {
                break;
            };
            if let SseLine::Data(payload) = decode_line(&line)
                && self.accumulator.push_final(&payload) == Accumulation::Updated
            {
                self.publish(SessionState::Streaming);
            }
        }
    }

    fn publish(&self, state: SessionState) {
        self.publisher.send_replace(SessionUpdate {
            state,
            text: self.accumulator.text().to_string(),
        });
    }

    fn fail(&self, error: SessionError) -> SessionError {
        self.publish(SessionState::Failed);
        error
    }
}

fn build_request(spec: &StreamRequest) -> Result<axum::extract::Request, SessionError> {
    let body = serde_json::to_vec(&spec.body)
        .map_err(|e| SessionError::RequestFailed(e.to_string()))?;
    let mut builder = axum::http::Request::builder()
        .method(Method::POST)
        .uri(&spec.url)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(bearer) = &spec.bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }
    builder
        .body(Body::from(body))
        .map_err(|e| SessionError::RequestFailed(e.to_string()))
}

/// Best-effort extraction of a human-readable message from a JSON error body.
async fn error_body_message(body: Body, status: axum::http::StatusCode) -> String {
    let fallback = format!("upstream returned status {status}");
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return fallback;
    };
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| v.get("error")?.as_str().map(str::to_string))
        .unwrap_or(fallback)
}
