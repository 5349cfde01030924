#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Actix-Web API server for the road hazard detection system.
//!
//! Exposes the client-facing REST API (detection uploads, nearby and
//! map-bounds hazard queries, route alerts, verification votes) and the
//! admin endpoints that drive the aggregation pipeline and decay sweep.

mod handlers;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use bump_aware_config::Settings;
use bump_aware_database::{db, run_migrations};
use std::sync::Arc;
use switchy_database::Database;

/// Shared application state.
pub struct AppState {
    /// `PostGIS` database connection.
    pub db: Arc<dyn Database>,
    /// Pipeline and alert tunables, loaded once at startup.
    pub settings: Settings,
}

/// Starts the road hazard API server.
///
/// Loads settings, connects to the `PostGIS` database, runs migrations,
/// and starts the Actix-Web HTTP server. This is a regular async
/// function — the caller is responsible for providing the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the settings are invalid, the database connection fails, or
/// migrations fail.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let settings = Settings::from_env().expect("Invalid settings");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .expect("Failed to connect to database");

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .expect("Failed to run migrations");

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        settings,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(handlers::health))
                    .route(
                        "/detections/batch",
                        web::post().to(handlers::upload_detections),
                    )
                    .route("/hazards/nearby", web::get().to(handlers::nearby_hazards))
                    .route("/hazards/bounds", web::get().to(handlers::hazards_in_bounds))
                    .route("/hazards/alerts", web::get().to(handlers::route_alerts))
                    .route("/hazards/{id}", web::get().to(handlers::get_hazard))
                    .route(
                        "/hazards/{id}/verify",
                        web::post().to(handlers::verify_hazard),
                    )
                    .route(
                        "/admin/process-detections",
                        web::post().to(handlers::process_detections),
                    )
                    .route("/admin/decay-hazards", web::post().to(handlers::decay_hazards))
                    .route("/admin/stats", web::get().to(handlers::stats)),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
