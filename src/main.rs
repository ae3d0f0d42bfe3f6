use std::net::SocketAddr;
use std::sync::Arc;

use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_helpscout_sync::config::Config;
use rust_helpscout_sync::gateway_client::HelpScoutClient;
use rust_helpscout_sync::handlers::AppState;
use rust_helpscout_sync::identity_lock::build_identity_lock;
use rust_helpscout_sync::reconciler::Reconciler;
use rust_helpscout_sync::transport::HttpTransport;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Help Scout transport and client.
/// - Identity lock strategy.
/// - HTTP routes and middleware (body limit, rate limiting, tracing).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_helpscout_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Fails on a blank API key before anything touches the network
    let transport = HttpTransport::from_config(&config)?;
    tracing::info!("✓ Help Scout client initialized: {}", transport.base_url());

    let reconciler = Reconciler::new(Arc::new(HelpScoutClient::new(transport)))
        .with_lock(build_identity_lock(config.identity_lock));
    tracing::info!("Identity lock strategy: {:?}", config.identity_lock);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        reconciler: Arc::new(reconciler),
    });

    // Configure rate limiter: 50 requests/second per IP, burst of 100
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(50)
            .burst_size(100)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = rust_helpscout_sync::api::router(app_state).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
