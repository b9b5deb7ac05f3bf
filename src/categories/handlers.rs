use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{dto::CreateCategoryRequest, repo_types::Category, services};
use crate::{error::AppResult, openapi::ErrorResponse, state::AppState};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/createCategory", post(create_category))
}

#[utoipa::path(get, path = "/categories", tag = "categories", responses((status = 200, description = "All categories by name", body = [Category])))]
#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(services::list(&state).await?))
}

#[utoipa::path(
    post, path = "/categories/createCategory", tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Blank name", body = ErrorResponse),
        (status = 409, description = "Already exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = services::create(&state, &body.name, body.description.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}
