use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use chat_orchestrator::agent::GeminiModelClient;
use chat_orchestrator::config::{Config, StoreKind};
use chat_orchestrator::db::{ConversationStore, MemoryConversationStore, PgConversationStore};
use chat_orchestrator::routes::auth::StaticTokenResolver;
use chat_orchestrator::service::ChatService;
use chat_orchestrator::uploads::UploadStore;
use chat_orchestrator::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_orchestrator=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();

    // ── Storage ───────────────────────────────────────────────────────────────
    let store: Arc<dyn ConversationStore> = match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set (or CHAT_STORE=memory)")?;

            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await
                .context("Failed to connect to PostgreSQL")?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            info!("Database connection established and migrations applied");
            Arc::new(PgConversationStore::new(pool))
        }
        StoreKind::Memory => {
            warn!("Using the in-memory conversation store; history is lost on restart");
            Arc::new(MemoryConversationStore::new())
        }
    };

    // ── Dependency wiring ─────────────────────────────────────────────────────
    if config.google_api_key.is_none() {
        warn!("GOOGLE_API_KEY is not set; every send will fail with a configuration error");
    }
    let model = GeminiModelClient::new(config.google_api_key.as_deref(), config.model_timeout)?;
    let chat = ChatService::new(store, Arc::new(model), config.default_model.clone());

    let state = AppState {
        chat,
        uploads: UploadStore::new(&config.upload_dir),
        auth: Arc::new(StaticTokenResolver::new(config.auth_tokens.clone())),
    };

    // ── Router ────────────────────────────────────────────────────────────────
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = router(state).layer(cors);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/ (default model {})", config.default_model);

    axum::serve(listener, app).await?;
    Ok(())
}
