//! Configuration parsing and validation for the gateway server
//!
//! Command-line argument parsing via clap. Secrets (the upstream provider
//! key and the publishable keys accepted from browsers) are read from the
//! environment rather than flags so they stay out of process listings.
use anyhow::anyhow;
use clap::Parser;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the gateway server will listen.
    #[arg(short = 'p', long, default_value_t = 3000)]
    pub port: u16,

    /// The port on which the metrics server will listen.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, default_value_t = true)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "trailmap")]
    pub metrics_prefix: String,

    /// Base URL of the upstream AI provider.
    #[arg(long)]
    pub upstream_url: Url,

    /// Model identifier written into forwarded request bodies.
    #[arg(long, default_value = "google/gemini-2.5-flash")]
    pub model: String,

    /// API key for the upstream AI provider.
    #[arg(long, env = "TRAILMAP_UPSTREAM_API_KEY", hide_env_values = true)]
    pub upstream_api_key: Option<String>,

    /// Comma-separated publishable keys accepted from clients. When unset,
    /// the gateway accepts unauthenticated requests.
    #[arg(long, env = "TRAILMAP_PUBLISHABLE_KEYS", hide_env_values = true, value_delimiter = ',')]
    pub publishable_keys: Vec<String>,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.upstream_url.cannot_be_a_base() {
            return Err(anyhow!(
                "Upstream URL '{}' cannot be used as a base URL",
                self.upstream_url
            ));
        }
        if self.publishable_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(anyhow!("Publishable keys must not be empty"));
        }
        Ok(self)
    }
}
