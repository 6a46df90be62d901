mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{
    auth::TokenVerifier, encryption::EncryptionService, queue::SubmissionQueue,
    storage::DocumentStore, vision::VisionClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing id-verify server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "verification_submissions_total",
        "Total document-verification submissions accepted"
    );
    metrics::describe_counter!(
        "verification_decisions_total",
        "Total automated decisions produced, labeled by outcome"
    );
    metrics::describe_counter!(
        "verification_submissions_failed",
        "Total submissions that exhausted worker retries"
    );
    metrics::describe_counter!(
        "verification_overrides_total",
        "Total manual reviewer overrides recorded"
    );
    metrics::describe_histogram!(
        "document_analysis_seconds",
        "Time spent analyzing a single document"
    );
    metrics::describe_histogram!(
        "submission_processing_seconds",
        "Time to process a full verification submission"
    );
    metrics::describe_gauge!(
        "verification_queue_depth",
        "Current number of submissions waiting for a worker"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize R2 document store
    tracing::info!("Initializing document store");
    let storage = DocumentStore::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize document store");

    // Initialize encryption service
    tracing::info!("Initializing AES-256-GCM encryption");
    let encryption =
        EncryptionService::new(&config.encryption_key).expect("Failed to initialize encryption");

    // Initialize Redis submission queue
    tracing::info!("Connecting to Redis submission queue");
    let queue = SubmissionQueue::new(&config.redis_url).expect("Failed to initialize queue");

    let auth = TokenVerifier::new(&config.jwt_secret);

    // Vision credentials are optional: without them, every submission is
    // deferred to manual review by the worker.
    let vision = match config.vision_credentials() {
        Some((account_id, api_token)) => {
            tracing::info!("Initializing Workers AI vision client");
            Some(VisionClient::new(account_id, api_token))
        }
        None => {
            tracing::warn!(
                "No Workers AI credentials configured; submissions will go to manual review"
            );
            None
        }
    };

    let state = AppState::new(
        db_pool,
        storage,
        encryption,
        queue,
        auth,
        vision,
        config.decision_thresholds(),
        config.vision_quota_rpm,
    );

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/verifications", post(routes::verify::submit_documents))
        .route(
            "/api/v1/verifications/{submission_id}",
            get(routes::verify::get_submission_status),
        )
        .route("/api/v1/review/override", post(routes::review::override_status))
        .route(
            "/api/v1/review/users/{user_id}",
            get(routes::review::get_user_verification),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(25 * 1024 * 1024)); // four documents at ~5 MB each

    tracing::info!("Starting id-verify on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
