/// Axum handlers for the gateway's AI endpoints
///
/// The three conversation endpoints assemble an upstream chat-completions
/// request with `stream: true`, forward it through the configured
/// [`HttpClient`], and relay the SSE body verbatim; the electives advisor is
/// a single-shot call returning one structured answer. Upstream rate-limit
/// (429) and billing (402) statuses pass through as JSON errors so the
/// browser client can map them to typed signals; any other upstream failure
/// is collapsed to a generic 500, never leaked.
use crate::AppState;
use crate::auth::{bearer_token, validate_bearer_token};
use crate::chat::ChatMessage;
use crate::client::HttpClient;
use crate::prompt::{
    ElectivesContext, RoadmapContext, assistant_messages, electives_messages,
    roadmap_chat_messages, roadmap_messages,
};
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument};

/// Follow-up chat about a generated roadmap.
#[derive(Debug, Deserialize)]
pub struct RoadmapChatRequest {
    pub roadmap_content: String,
    pub career_path_name: String,
    pub messages: Vec<ChatMessage>,
}

/// General assistant conversation.
#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub messages: Vec<ChatMessage>,
}

/// `POST /v1/roadmaps/generate`
#[instrument(skip(state, context))]
pub async fn generate_roadmap<T: HttpClient>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
    Json(context): Json<RoadmapContext>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    if context.career_path_name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Career path is required");
    }
    info!(career_path = %context.career_path_name, "generating roadmap");
    relay_completion_stream(&state, roadmap_messages(&context)).await
}

/// `POST /v1/roadmaps/chat`
#[instrument(skip(state, request))]
pub async fn chat_roadmap<T: HttpClient>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
    Json(request): Json<RoadmapChatRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    if request.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Messages are required");
    }
    let messages = roadmap_chat_messages(
        &request.roadmap_content,
        &request.career_path_name,
        &request.messages,
    );
    relay_completion_stream(&state, messages).await
}

/// `POST /v1/assistant`
#[instrument(skip(state, request))]
pub async fn assistant<T: HttpClient>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
    Json(request): Json<AssistantRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    if request.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Messages are required");
    }
    relay_completion_stream(&state, assistant_messages(&request.messages)).await
}

/// `POST /v1/electives/advice`
///
/// Single-shot, not streamed: the upstream answers with one structured JSON
/// recommendation, which is extracted from the completion and returned as-is.
#[instrument(skip(state, context))]
pub async fn advise_electives<T: HttpClient>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
    Json(context): Json<ElectivesContext>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    if context.career_goal.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Career goal is required");
    }

    let payload = json!({
        "model": state.upstream.model,
        "messages": electives_messages(&context),
    });
    let upstream = match send_upstream(&state, &payload).await {
        Ok(upstream) => upstream,
        Err(response) => return response,
    };

    match upstream.status() {
        StatusCode::TOO_MANY_REQUESTS => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again.",
        ),
        status if !status.is_success() => {
            error!(%status, "upstream AI provider returned an error");
            gateway_error()
        }
        _ => {
            let bytes = match axum::body::to_bytes(upstream.into_body(), usize::MAX).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("failed to read upstream completion: {e}");
                    return gateway_error();
                }
            };
            let content = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| {
                    v.pointer("/choices/0/message/content")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            (StatusCode::OK, Json(parse_advice(&content))).into_response()
        }
    }
}

/// The model is instructed to answer with plain JSON but may wrap it in a
/// markdown fence or surrounding prose. Fall back to the raw text when no
/// parseable document is found.
fn parse_advice(content: &str) -> Value {
    serde_json::from_str(extract_json_block(content)).unwrap_or_else(|_| {
        debug!("electives completion was not valid JSON, returning raw text");
        json!({
            "recommendations": [],
            "comparison_summary": content,
            "error": "Could not parse structured response",
        })
    })
}

/// Strip a markdown code fence, or cut down to the outermost braces.
fn extract_json_block(content: &str) -> &str {
    if let Some(start) = content.find("```") {
        let fenced = &content[start + 3..];
        let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            return fenced[..end].trim();
        }
    }
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content,
    }
}

/// Check the caller's publishable key. An empty key set disables the check.
fn authorize<T: HttpClient>(state: &AppState<T>, headers: &HeaderMap) -> Result<(), Response> {
    if state.keys.is_empty() {
        return Ok(());
    }
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);
    match token {
        Some(token) if validate_bearer_token(&state.keys, token) => Ok(()),
        _ => Err(error_response(StatusCode::UNAUTHORIZED, "Invalid API key")),
    }
}

/// Forward an assembled message list upstream and relay the SSE response.
async fn relay_completion_stream<T: HttpClient>(
    state: &AppState<T>,
    messages: Vec<Value>,
) -> Response {
    let payload = json!({
        "model": state.upstream.model,
        "messages": messages,
        "stream": true,
    });
    let upstream = match send_upstream(state, &payload).await {
        Ok(upstream) => upstream,
        Err(response) => return response,
    };

    match upstream.status() {
        StatusCode::TOO_MANY_REQUESTS => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limits exceeded, please try again later.",
        ),
        StatusCode::PAYMENT_REQUIRED => error_response(
            StatusCode::PAYMENT_REQUIRED,
            "Payment required, please add funds to continue.",
        ),
        status if !status.is_success() => {
            error!(%status, "upstream AI provider returned an error");
            gateway_error()
        }
        _ => {
            // Relay the SSE body as-is; framing happens client side
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(upstream.into_body())
                .unwrap_or_else(|_| gateway_error())
        }
    }
}

/// Build and send one chat-completions request to the upstream provider.
async fn send_upstream<T: HttpClient>(
    state: &AppState<T>,
    payload: &Value,
) -> Result<Response, Response> {
    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(e) => {
            error!("failed to serialize upstream payload: {e}");
            return Err(gateway_error());
        }
    };

    let url = match state.upstream.completions_url() {
        Ok(url) => url,
        Err(e) => {
            error!("invalid upstream URL: {e}");
            return Err(gateway_error());
        }
    };

    let mut builder = axum::http::Request::builder()
        .method(Method::POST)
        .uri(url.as_str())
        .header(header::CONTENT_TYPE, "application/json");
    // Match the host header to the upstream (some CDNs reject mismatches)
    if let Some(host) = url.host_str() {
        let host_value = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        builder = builder.header(header::HOST, host_value);
    }
    if let Some(key) = &state.upstream.api_key {
        debug!("adding authorization header for {}", state.upstream.url);
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    let request = match builder.body(Body::from(body)) {
        Ok(request) => request,
        Err(e) => {
            error!("failed to build upstream request: {e}");
            return Err(gateway_error());
        }
    };

    state.http_client.request(request).await.map_err(|e| {
        error!("error forwarding request to {}: {}", url, e);
        gateway_error()
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn gateway_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "AI gateway error")
}
