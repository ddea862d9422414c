//! QA tracker server - main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use qa_tracker_lib::api::{self, ApiDoc};
use qa_tracker_lib::config::{Config, OPERATOR_HEADER};
use qa_tracker_lib::db::DbPool;
use qa_tracker_lib::middleware::{REQUEST_ID_HEADER, RequestLogger};
use qa_tracker_lib::services::EventBroadcaster;
use qa_tracker_lib::tracker::{ExecutionStore, ExecutionTracker};

/// Docker HEALTHCHECK: configuration must load.
fn health_check() -> bool {
    Config::from_env().is_ok()
}

fn build_cors(origins: &[String]) -> Cors {
    let cors = origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));

    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-operator-id"),
        ])
        .expose_headers(vec![header::HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL must be set and not the development default");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  QA Tracker Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let pool = match DbPool::new(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database connection established");

    if let Err(e) = pool.run_migrations().await {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Database migrations complete");

    let store: Arc<dyn ExecutionStore> = Arc::new(pool.clone());
    let tracker = web::Data::new(ExecutionTracker::new(store, config.tracker));
    let broadcaster = web::Data::new(EventBroadcaster::new());
    let pool = web::Data::new(pool);

    info!(
        completion_stamp = %config.tracker.completion_stamp,
        operator_header = OPERATOR_HEADER,
        "Execution tracker ready"
    );

    let bind_address = config.bind_address();
    let cors_origins = config.cors_origins.clone();
    if cors_origins.is_empty() {
        info!("CORS: same-origin only");
    } else {
        info!("CORS origins: {}", cors_origins.join(", "));
    }

    let worker_count = if config.is_development() {
        4
    } else {
        num_cpus::get()
    };
    info!(
        "Starting server at http://{} ({} workers)",
        bind_address, worker_count
    );

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(RequestLogger)
            .app_data(pool.clone())
            .app_data(tracker.clone())
            .app_data(broadcaster.clone())
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_test_case_routes)
                    .configure(api::configure_session_routes)
                    .configure(api::configure_execution_routes)
                    .configure(api::configure_websocket_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}
