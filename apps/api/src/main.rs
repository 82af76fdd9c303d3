mod analysis;
mod config;
mod errors;
mod llm_client;
mod platform;
mod routes;
mod state;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::config::{Config, KvBackend};
use crate::llm_client::LlmClient;
use crate::platform::ai::LlmScorer;
use crate::platform::auth::StaticTokenAuth;
use crate::platform::convert::PdftoppmConverter;
use crate::platform::kv::{MemoryStore, RedisStore};
use crate::platform::storage::S3Storage;
use crate::platform::{KeyValueStore, Storage};
use crate::routes::build_router;
use crate::state::{AppState, RunRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ispani API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let storage: Arc<dyn Storage> = Arc::new(S3Storage::new(s3, config.s3_bucket.clone()));
    info!("S3 storage initialized (bucket: {})", config.s3_bucket);

    // Initialize the record store
    let kv: Arc<dyn KeyValueStore> = match (config.kv_backend, config.redis_url.as_deref()) {
        (KvBackend::Redis, Some(url)) => {
            let client = redis::Client::open(url)?;
            let store = RedisStore::connect(&client)
                .await
                .context("failed to connect to Redis")?;
            info!("Redis record store connected");
            Arc::new(store)
        }
        _ => {
            info!("Using in-memory record store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let analyzer = Analyzer::new(
        storage.clone(),
        Arc::new(PdftoppmConverter::new(config.preview_dpi)),
        Arc::new(LlmScorer::new(llm, storage.clone())),
        kv.clone(),
    )
    .with_ai_timeout(config.ai_timeout);
    match config.ai_timeout {
        Some(timeout) => info!("AI step timeout: {}s", timeout.as_secs()),
        None => info!("AI step timeout disabled"),
    }
    info!("Finished runs are kept for {:?}", config.run_retention);

    // Build app state
    let state = AppState {
        analyzer: Arc::new(analyzer),
        kv,
        storage,
        auth: Arc::new(StaticTokenAuth::new(
            config.api_token.clone(),
            config.api_user.clone(),
        )),
        runs: RunRegistry::with_retention(config.run_retention),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "ispani-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by virtual host
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
