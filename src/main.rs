mod domain;
mod middleware;
mod services;
mod state;
mod store;
mod web;

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::{AppState, SharedState};
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:crowdscore.db".to_string());
    tracing::info!("Abrindo o banco de dados local...");
    let store = Store::open(&database_url).await.map_err(|e| {
        tracing::error!("Não foi possível carregar os dados: {e}");
        e
    })?;
    tracing::info!("Banco de dados pronto");

    store::seed::seed_demo_data(&store).await?;

    let session_key = load_session_key(&store).await?;

    let shared: SharedState = Arc::new(AppState {
        store,
        analysis: Arc::new(services::analysis::AnalysisService::new()),
        session_key,
        login_limiter: middleware::RateLimiter::new(5, 60),
        loading_analyses: Arc::new(tokio::sync::RwLock::new(std::collections::HashSet::new())),
    });

    let app = web::routes(shared)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("0.0.0.0:{port}")
    });
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Session keys come from `SESSION_KEY` (base64) when set; otherwise one is
/// generated on first run and kept in the settings collection.
async fn load_session_key(store: &Store) -> anyhow::Result<Vec<u8>> {
    if let Ok(raw) = std::env::var("SESSION_KEY") {
        return Ok(general_purpose::STANDARD.decode(raw.trim())?);
    }
    if let Some(saved) = store.get_setting::<String>("sessionKey").await? {
        return Ok(general_purpose::STANDARD.decode(saved)?);
    }
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    let encoded = general_purpose::STANDARD.encode(key);
    store.put_setting("sessionKey", &encoded).await?;
    Ok(key.to_vec())
}
