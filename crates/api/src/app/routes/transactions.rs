use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use tally_core::AccountId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_transaction).get(list_transactions))
}

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateTransactionRequest>,
) -> axum::response::Response {
    let command = match body.into_command() {
        Ok(command) => command,
        Err(resp) => return resp,
    };

    let outcome = match command {
        dto::TransactionCommand::Deposit {
            destination,
            amount,
        } => services.executor.deposit(destination, amount).await,
        dto::TransactionCommand::Withdraw {
            destination,
            amount,
        } => services.executor.withdraw(destination, amount).await,
        dto::TransactionCommand::Transfer {
            source,
            destination,
            amount,
        } => services.executor.transfer(source, destination, amount).await,
    };

    match outcome {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => errors::ledger_error_to_response(&e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListTransactionsParams>,
) -> axum::response::Response {
    let account = AccountId::new(params.account_id);
    match services
        .history
        .list_transactions(account, params.from, params.to)
        .await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => errors::ledger_error_to_response(&e),
    }
}
