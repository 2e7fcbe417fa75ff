use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::branch::{Branch, NewBranch};
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/branches", get(list_branches).post(create_branch))
        .route("/api/branches/resolve", get(resolve_branch))
}

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub address: String,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub branch: Option<Branch>,
}

async fn list_branches(State(state): State<Arc<AppState>>) -> Json<Vec<Branch>> {
    Json(state.branches.list())
}

async fn create_branch(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<NewBranch>,
) -> Result<(StatusCode, Json<Branch>), AppError> {
    if !actor.is(Role::MainAdmin) {
        return Err(AppError::Forbidden("only the main admin can add branches".to_string()));
    }

    let branch = state.branches.add(payload)?;
    Ok((StatusCode::CREATED, Json(branch)))
}

async fn resolve_branch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResolveQuery>,
) -> Json<ResolveResponse> {
    let branch = state
        .branches
        .resolve(&query.address)
        .and_then(|id| state.branches.get(id));

    Json(ResolveResponse { branch })
}
