//! folio-chat - widget host
//!
//! Serves the chat widget's per-tab sessions to the portfolio front end and
//! forwards user turns to the configured chat backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_chat::config::Config;
use folio_chat::core::SessionHub;
use folio_chat::providers::Provider;
use folio_chat::routes;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let widget = config.load_widget_config()?;
    let provider = Provider::from_config(&config)?;
    tracing::info!("💬 Using '{}' chat backend", provider.name());
    if config.timeout_secs.is_none() {
        tracing::debug!("No client-side timeout on chat requests");
    }

    let hub = SessionHub::new(widget, Arc::new(provider), config.session_ttl());
    let state = routes::state(hub);

    let sweeper = state.hub.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep_expired(chrono::Utc::now()).await;
        }
    });

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🔥 Chat widget host running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
