mod auth;
mod config;
mod db;
mod errors;
mod intake;
mod models;
mod pipeline;
mod records;
mod routes;
mod scoring;
mod state;
mod storage;
mod store;
mod uploads;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::intake::IntakeLimits;
use crate::records::RecordCache;
use crate::routes::build_router;
use crate::scoring::{AnalysisJobs, HttpScoringClient, ScoringService};
use crate::state::AppState;
use crate::storage::S3BlobStore;
use crate::store::PgStore;
use crate::uploads::UploadCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ShortlistAI API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let blobs = Arc::new(S3BlobStore::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_public_url.clone(),
    ));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Scoring is optional; analysis requests are refused without it
    let scoring: Option<Arc<dyn ScoringService>> = match &config.scoring_service_url {
        Some(url) => {
            let client = HttpScoringClient::new(url.clone(), config.scoring_api_key.clone())
                .context("Failed to build scoring client")?;
            info!("Scoring service: {url}");
            Some(Arc::new(client) as Arc<dyn ScoringService>)
        }
        None => {
            warn!("SCORING_SERVICE_URL is not set; candidate analysis is disabled");
            None
        }
    };

    let state = AppState {
        screening_store: store.clone(),
        candidate_store: store.clone(),
        profiles: store,
        uploads: UploadCoordinator::new(blobs.clone()),
        blobs,
        cache: Arc::new(RecordCache::default()),
        scoring,
        jobs: AnalysisJobs::default(),
        scoring_settings: config.scoring,
        intake_limits: IntakeLimits::default(),
    };

    let app = build_router(state, config.upload_body_limit_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web app's domain

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
        "shortlist-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
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
