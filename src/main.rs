use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod auth;
mod cli;
mod config;
mod database;
mod error;
mod handlers;
mod import;
mod middleware;
mod services;

use cli::{Cli, Command};
use database::manager::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::config();
    tracing::info!(environment = ?config.environment, "starting realty-api");

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Migrate) => {
            DatabaseManager::migrate().await?;
            tracing::info!("migrations applied");
            Ok(())
        }
        Some(Command::Seed) => {
            DatabaseManager::migrate().await?;
            let pool = DatabaseManager::pool().await?;
            cli::seed::run(&pool).await?;
            tracing::info!("seed complete");
            Ok(())
        }
        Some(Command::Serve { port }) => serve(port).await,
        None => serve(None).await,
    }
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let app = app();

    // Allow tests or deployments to override port via env
    let port = port
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API behind JWT
        .merge(api_routes())
        // Global middleware
        .layer(DefaultBodyLimit::max(config::config().api.max_request_size_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router {
    use handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

fn api_routes() -> Router {
    use handlers::protected::{analytics, auth, currencies, imports, leads, projects, units};

    Router::new()
        // Session
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        // Projects
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/:id",
            get(projects::get).put(projects::update).delete(projects::delete),
        )
        // Units, with CSV import/export and bulk operations
        .route("/api/units", get(units::list).post(units::create))
        .route("/api/units/import", post(imports::import_units))
        .route("/api/units/export", get(imports::export_units))
        .route("/api/units/bulk/status", axum::routing::put(units::bulk_status))
        .route("/api/units/bulk/prices", axum::routing::put(units::bulk_prices))
        .route("/api/units/bulk", axum::routing::delete(units::bulk_delete))
        .route(
            "/api/units/:id",
            get(units::get).put(units::update).delete(units::delete),
        )
        // Leads
        .route("/api/leads", get(leads::list).post(leads::create))
        .route(
            "/api/leads/:id",
            get(leads::get).put(leads::update).delete(leads::delete),
        )
        // Currencies
        .route("/api/currencies", get(currencies::list))
        .route("/api/currencies/convert", get(currencies::convert))
        .route("/api/currencies/:key", get(currencies::get))
        // Analytics
        .route("/api/analytics/dashboard", get(analytics::dashboard))
        .route_layer(axum::middleware::from_fn(middleware::auth::jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    }))
}

async fn health() -> (axum::http::StatusCode, axum::response::Json<Value>) {
    match DatabaseManager::health_check().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({"success": true, "status": "healthy"})),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({"success": false, "status": "unhealthy", "error": e.to_string()})),
        ),
    }
}
