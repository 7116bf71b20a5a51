use axum::Router;

pub mod accounts;
pub mod system;
pub mod transactions;

/// Router for all API endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/api/accounts", accounts::router())
        .nest("/api/transactions", transactions::router())
}
