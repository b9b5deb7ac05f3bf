use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreatePaymentRequest, SpendingSummary},
    repo_types::{Payment, PaymentView},
    services,
};
use crate::{
    auth::extractors::SessionUser, error::AppResult, openapi::ErrorResponse, state::AppState,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments))
        .route("/payments/createPayment", post(create_payment))
        .route("/payments/summary", get(spending_summary))
}

#[utoipa::path(get, path = "/payments", tag = "payments", responses((status = 200, description = "All payments, newest first", body = [PaymentView])))]
#[instrument(skip(state))]
pub async fn list_payments(State(state): State<AppState>) -> AppResult<Json<Vec<PaymentView>>> {
    Ok(Json(services::list(&state).await?))
}

#[utoipa::path(
    post, path = "/payments/createPayment", tag = "payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Created; category added if new", body = Payment),
        (status = 400, description = "Non-positive amount or blank category", body = ErrorResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Paying for another user", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
#[instrument(skip(state, session, body), fields(user = %session.username))]
pub async fn create_payment(
    State(state): State<AppState>,
    session: SessionUser,
    Json(body): Json<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    let owner = body
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(&session.username)
        .to_string();
    session.ensure_can_act_for(&owner)?;

    let payment = services::create(&state, &owner, body).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[utoipa::path(
    get, path = "/payments/summary", tag = "payments",
    responses((status = 200, description = "Totals per category for the session user", body = SpendingSummary), (status = 401, description = "No valid session", body = ErrorResponse))
)]
#[instrument(skip(state, session), fields(user = %session.username))]
pub async fn spending_summary(
    State(state): State<AppState>,
    session: SessionUser,
) -> AppResult<Json<SpendingSummary>> {
    Ok(Json(services::summary(&state, &session.username).await?))
}
