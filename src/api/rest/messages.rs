use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::engine::relay;
use crate::error::AppError;
use crate::models::message::Message;
use crate::models::parcel::{NewParcel, Parcel};
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/messages", get(inbox).post(send_message))
        .route("/api/messages/:id/read", put(mark_read))
        .route("/api/messages/:id/approve", post(approve))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default = "default_receiver")]
    pub receiver_role: Role,
    #[serde(default)]
    pub parcel_data: Option<NewParcel>,
}

fn default_receiver() -> Role {
    Role::MainAdmin
}

async fn inbox(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Json<Vec<Message>> {
    Json(relay::list_for(&state, actor.role))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = relay::send(
        &state,
        &actor,
        payload.content,
        payload.receiver_role,
        payload.parcel_data,
    )?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    relay::mark_read(&state, &actor, id).map(Json)
}

async fn approve(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Parcel>), AppError> {
    let parcel = relay::approve_and_create(&state, &actor, id)?;
    Ok((StatusCode::CREATED, Json(parcel)))
}
