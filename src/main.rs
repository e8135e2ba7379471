use anyhow::Context;
use axum::http::HeaderValue;
use consult_relay::{config::Config, db, routes, AppState};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_idle_minutes)));

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(HeaderValue::from_str(origin).context("CORS_ORIGIN is not a valid header value")?)
            .allow_credentials(true),
        None => CorsLayer::new().allow_origin(Any),
    };

    let db_pool = db::connect(&config.database_url).await?;
    let app_state = AppState::new(db_pool, &config);
    if config.consultants.is_empty() {
        tracing::warn!("no CONSULTANTS configured, guest messages cannot be delivered");
    }

    let app = routes()
        .with_state(app_state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, consultants = config.consultants.len(), "consult relay listening");

    axum::serve(listener, app).await?;
    Ok(())
}
