mod achievement;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod reports;
mod routes;
mod state;
mod store;
mod upload;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::achievement::lifecycle::AchievementLifecycle;
use crate::config::Config;
use crate::db::{create_mongo_database, create_pool};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::mongo::MongoAchievementStore;
use crate::store::postgres::{PgDirectory, PgReferenceStore};
use crate::store::{AchievementStore, Directory, ReferenceStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Tracing targets use the underscored crate name, not the
            // hyphenated package name.
            EnvFilter::new(format!("simpres_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Simpres API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (workflow references and profiles)
    let pool = create_pool(&config.database_url).await?;

    // Initialize MongoDB (achievement payload documents)
    let mongo = create_mongo_database(&config.mongo_url, &config.mongo_db).await?;

    // Initialize S3 / MinIO for attachment files
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let decoding_key = Arc::new(jsonwebtoken::DecodingKey::from_secret(
        config.jwt_secret.as_bytes(),
    ));

    let references: Arc<dyn ReferenceStore> = Arc::new(PgReferenceStore::new(pool.clone()));
    let directory: Arc<dyn Directory> = Arc::new(PgDirectory::new(pool));
    let achievements: Arc<dyn AchievementStore> = Arc::new(MongoAchievementStore::new(&mongo));
    let lifecycle = Arc::new(AchievementLifecycle::new(
        references.clone(),
        achievements.clone(),
        directory.clone(),
    ));

    let state = AppState {
        s3,
        config: config.clone(),
        decoding_key,
        references,
        achievements,
        directory,
        lifecycle,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

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
        "simpres-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
