//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: engine wiring over the connection pool
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and validation
//! - `errors.rs`: stable error codes and responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use sqlx::PgPool;
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(pool: PgPool) -> Router {
    let services = Arc::new(services::AppServices::new(pool));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_span))
                .layer(Extension(services)),
        )
}
