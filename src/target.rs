//! Upstream AI provider target
//!
//! The gateway fronts exactly one OpenAI-compatible chat-completions
//! endpoint. The target carries the base URL, the provider API key placed in
//! the `Authorization: Bearer` header of forwarded requests, and the model
//! name written into each request body.

use bon::Builder;
use serde::{Deserialize, Serialize};
use url::Url;

/// Path of the chat-completions endpoint relative to the target base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

/// The upstream provider requests are forwarded to.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct UpstreamTarget {
    /// Base URL of the provider, e.g. `https://ai.gateway.example/`.
    pub url: Url,
    /// Provider API key; forwarded as a bearer header when set.
    pub api_key: Option<String>,
    /// Model identifier written into forwarded request bodies.
    #[builder(into)]
    pub model: String,
}

impl UpstreamTarget {
    /// Absolute URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> Result<Url, url::ParseError> {
        self.url.join(CHAT_COMPLETIONS_PATH)
    }
}
