#![allow(dead_code, unused)]
use anyhow::Context;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_appender::non_blocking::WorkerGuard;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod workflow;
mod api;
mod middleware;
mod utils;
mod app_state;

use crate::api::auth::AuthDoc;
use crate::api::inventory::InventoryDoc;
use crate::api::requests::RequestDoc;
use crate::app_state::AppState;
use crate::config::Config;
use crate::middleware::auth::{actor_context_middleware, create_actor_cache, jwt_middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    Config::init();

    let _log_guard = init_tracing();

    let pool = db::pool::create_pool()
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let state = AppState::new(pool.clone());
    let actor_cache = create_actor_cache();

    let merged_doc = AuthDoc::openapi()
        .merge_from(RequestDoc::openapi())
        .merge_from(InventoryDoc::openapi());

    // Public routes
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::requests::request_routes())
        .merge(api::inventory::inventory_routes())
        .merge(api::auth::secure_auth_routes())
        .route_layer(from_fn_with_state(state.clone(), actor_context_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(
            SwaggerUi::new("/swagger")
                .url("/api-docs/openapi.json", merged_doc.clone())
        )
        .merge(
            RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc)
                .path("/rapidoc")
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(Extension(actor_cache))
        .with_state(state);

    let config = Config::get();
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await
        .context("Server encountered an error")?;

    tracing::info!("Shutdown complete.");
    Ok(())
}

/// Logs go to stdout, or to daily-rotated files under `logs/` when
/// `LOG_TO_FILE` is set. The returned guard must stay alive for the life of
/// the process; dropping it stops the non-blocking writer.
fn init_tracing() -> Option<WorkerGuard> {
    let config = Config::get();
    if config.log_to_file {
        std::fs::create_dir_all("logs").ok();
        let file_appender = tracing_appender::rolling::daily("logs", "app.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(true)
            .init();
        None
    }
}

async fn shutdown_signal(pool: PgPool) {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down...");
    tracing::info!("🛠️ Closing database pool...");
    pool.close().await;
    tracing::info!("✅ Database pool closed. Server shutting down.");
}
