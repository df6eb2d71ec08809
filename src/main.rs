use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, DEFAULT_REPLY_TIMEOUT_SECS};
use pix_core::{
    config::duration_from_env_value, CorrelationStore, ErrorReporter, Gateway, GatewayConfig,
    MllpTransport,
};

/// Main entry point for the PIX gateway
///
/// Starts the gateway run loop, a task that logs everything reported on the error channel, and
/// the REST front end that feeds events into the gateway.
///
/// # Environment Variables
/// - `PIX_SENDING_APPLICATION`, `PIX_SENDING_FACILITY`, `PIX_RECEIVING_APPLICATION`,
///   `PIX_RECEIVING_FACILITY`: `MSH` endpoints (required)
/// - `XDS_REGISTRY_HOST`, `XDS_REGISTRY_PORT`: registry MLLP endpoint (required)
/// - `PIX_TRANSPORT_TIMEOUT_SECS`: bound on one registry exchange (default: 30)
/// - `PIX_PENDING_TIMEOUT_SECS`: drop unanswered requests after this long (default: never)
/// - `PIX_REPORT_REJECTIONS`, `PIX_DETAILED_REJECTIONS`: rejection replies (default: off)
/// - `PIX_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PIX_REPLY_TIMEOUT_SECS`: how long a REST caller waits for the outcome (default: 60)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pix=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = GatewayConfig::from_lookup(|key| std::env::var(key).ok())?;
    let rest_addr = std::env::var("PIX_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let reply_timeout = duration_from_env_value(
        "PIX_REPLY_TIMEOUT_SECS",
        std::env::var("PIX_REPLY_TIMEOUT_SECS").ok(),
    )?
    .unwrap_or(Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS));

    tracing::info!(
        "++ Forwarding PIX feeds to {}:{}",
        cfg.registry_host(),
        cfg.registry_port()
    );
    tracing::info!("++ Starting PIX REST on {}", rest_addr);

    let (errors, mut reports) = ErrorReporter::channel();
    let transport = MllpTransport::new(cfg.transport_timeout());
    let (gateway, handle) = Gateway::new(cfg, CorrelationStore::new(), transport, errors);

    let gateway_task = tokio::spawn(gateway.run());
    tokio::spawn(async move {
        while let Some(error) = reports.recv().await {
            tracing::error!("{error}");
        }
    });

    let app = api_rest::router(AppState::new(handle).with_reply_timeout(reply_timeout));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    gateway_task.await?;
    Ok(())
}
