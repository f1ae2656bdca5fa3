use anyhow::Result;
use aws_config::BehaviorVersion;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    metadata_store::SqliteMetadataStore,
    notifier::{LogNotifier, NotificationDispatch, SnsNotifier},
    object_gateway::S3Gateway,
    reconciler::CompletionReconciler,
    upload_service::UploadService,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-gateway with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Construct collaborator clients ---
    let aws_cfg = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_client = match &cfg.s3_endpoint {
        Some(endpoint) => {
            let s3_cfg = aws_sdk_s3::config::Builder::from(&aws_cfg)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();
            aws_sdk_s3::Client::from_conf(s3_cfg)
        }
        None => aws_sdk_s3::Client::new(&aws_cfg),
    };
    let gateway = Arc::new(S3Gateway::new(s3_client, cfg.bucket.clone()));

    let notifier: Arc<dyn NotificationDispatch> = match &cfg.sns_topic_arn {
        Some(topic_arn) => Arc::new(SnsNotifier::new(
            aws_sdk_sns::Client::new(&aws_cfg),
            topic_arn.clone(),
        )),
        None => {
            tracing::warn!("No SNS topic configured; completion notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let store = Arc::new(SqliteMetadataStore::new(db.clone()));

    // --- Initialize core components ---
    let uploads = UploadService::new(
        store.clone(),
        gateway,
        Duration::from_secs(cfg.url_ttl_secs),
        cfg.cdn_domain.clone(),
    );
    let reconciler = CompletionReconciler::new(store, notifier);

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(AppState {
        uploads,
        reconciler,
        db,
    });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations manually from the embedded SQL file.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let path = "migrations/0001_init.sql";

    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
