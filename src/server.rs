/// Server setup and initialization
///
/// Wires together all components: database, model provider, checkpoint store,
/// workflow engine, sweeper, and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_session_routes, SessionAppState},
    config::Config,
    database::SqliteDatabase,
    llm::{CompletionOptions, LlmProvider, OpenAiProvider},
    runtime::{
        engine::WorkflowEngine,
        executor::{sql_review_graph, StepExecutor},
        scheduler::CheckpointSweeper,
    },
    workflow::storage::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore},
};
use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Opens the queried database, connects the model provider, picks the
/// checkpoint store, compiles the graph, and starts the checkpoint sweeper.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🗄️ Opening database (read-only): {}", config.database.path);
    let database = SqliteDatabase::open(&config.database.path, config.database.sample_rows)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", config.database.path, e))?;

    let provider = OpenAiProvider::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.api_key.clone(),
    );
    tracing::info!(
        "🤖 Using {} model {} at {}",
        provider.name(),
        provider.model(),
        config.llm.base_url
    );
    let options = CompletionOptions {
        temperature: config.llm.temperature,
        timeout: Duration::from_secs(config.llm.timeout_secs),
        ..Default::default()
    };

    let store = create_checkpoint_store(&config).await?;

    tracing::info!("⚙️ Initializing step executor");
    let executor = StepExecutor::new(Arc::new(provider), Arc::new(database))
        .with_completion_options(options);

    tracing::info!("🕸️ Compiling SQL review graph");
    let graph = sql_review_graph().map_err(|e| anyhow::anyhow!("Invalid workflow graph: {}", e))?;

    tracing::info!("🚀 Initializing workflow engine");
    let engine = Arc::new(
        WorkflowEngine::new(Arc::new(graph), Arc::new(executor), store)
            .with_checkpoint_ttl(config.sessions.checkpoint_ttl()),
    );

    tracing::info!("⏰ Initializing checkpoint sweeper");
    let sweeper = Arc::new(
        CheckpointSweeper::new(Arc::clone(&engine), config.sessions.sweep_schedule.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize checkpoint sweeper: {}", e))?,
    );
    let sweeper_clone = Arc::clone(&sweeper);
    tokio::spawn(async move {
        if let Err(e) = sweeper_clone.start().await {
            tracing::error!("❌ Failed to start checkpoint sweeper: {}", e);
        }
    });

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_session_routes().with_state(SessionAppState { engine }));

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// In-memory checkpoints unless a checkpoint database is configured
async fn create_checkpoint_store(config: &Config) -> Result<Arc<dyn CheckpointStore>> {
    match &config.database.checkpoint_path {
        Some(path) => {
            tracing::info!("💾 Using SQLite checkpoint store: {}", path);
            let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await
                .map_err(|e| {
                    anyhow::anyhow!("Failed to open checkpoint database {}: {}", path, e)
                })?;

            let store = SqliteCheckpointStore::new(pool);
            store.init_schema().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("🧠 Using in-memory checkpoint store");
            Ok(Arc::new(MemoryCheckpointStore::new()))
        }
    }
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting sqlpilot server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
