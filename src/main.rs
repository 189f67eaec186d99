mod config;

use clap::Parser as _;
use config::Config;
use tokio::net::TcpListener;
use tracing::{info, instrument};
use trailmap::{
    AppState, auth::{ConstantTimeString, KeySet}, build_metrics_layer_and_handle,
    build_metrics_router, build_router, target::UpstreamTarget,
};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting roadmap gateway on port {}", config.port);

    let upstream = UpstreamTarget::builder()
        .url(config.upstream_url.clone())
        .maybe_api_key(config.upstream_api_key.clone())
        .model(config.model.clone())
        .build();

    let mut keys = KeySet::new();
    for key in &config.publishable_keys {
        keys.insert(ConstantTimeString::from(key.as_str()));
    }

    let app_state = AppState::new(upstream, keys);
    let mut router = build_router(app_state);

    if config.metrics {
        let (metrics_layer, metrics_handle) =
            build_metrics_layer_and_handle(config.metrics_prefix.clone());
        router = router.layer(metrics_layer);

        let metrics_router = build_metrics_router(metrics_handle);
        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics server listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, metrics_router).await {
                tracing::error!("metrics server error: {e}");
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Roadmap gateway listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
