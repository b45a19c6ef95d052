use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::state::AppState;
use crate::users::dto::ListParams;
use crate::users::error::UserError;
use crate::users::service::ReadOutcome;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, UserError> {
    let user = state.directory.create(&payload).await?;
    info!(user_id = user.id, email = %user.email, "user created");

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::LOCATION,
        format!("/users/{}", user.id).parse().unwrap(),
    );

    Ok((StatusCode::CREATED, headers, Json(user)))
}

#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, UserError> {
    let users = state.directory.list(!params.include_deleted).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, UserError> {
    match state.directory.read(id).await? {
        ReadOutcome::Active(user) => Ok(Json(user).into_response()),
        ReadOutcome::Tombstone { id } => Ok((
            StatusCode::GONE,
            Json(json!({
                "id": id,
                "deleted": true,
                "message": "User has been deleted.",
            })),
        )
            .into_response()),
    }
}

#[instrument(skip(state, payload))]
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, UserError> {
    let user = state.directory.update(id, &payload).await?;
    info!(user_id = user.id, email = %user.email, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UserError> {
    let confirmation = state.directory.delete(id).await?;
    info!(user_id = confirmation.id, "user soft-deleted");
    Ok(Json(confirmation))
}
