use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::engine::lifecycle::{self, Submission};
use crate::engine::reports::{self, Analytics, PartyReport};
use crate::engine::route::{self, RoutePlan};
use crate::error::AppError;
use crate::models::parcel::{NewParcel, Parcel, ParcelStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/parcels", post(create_parcel).get(list_parcels))
        .route("/api/parcels/track/:tracking_id", get(track_parcel))
        .route("/api/parcels/:id/status", put(update_status))
        .route("/api/parcels/assign", post(assign_rider))
        .route("/api/parcels/reports", get(party_report))
        .route("/api/parcels/analytics", get(analytics))
        .route("/api/parcels/route", get(plan_route))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ParcelStatus,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRiderRequest {
    pub parcel_id: Uuid,
    pub rider_id: Uuid,
}

#[derive(Deserialize)]
pub struct RouteQuery {
    pub date: Option<NaiveDate>,
}

async fn create_parcel(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<NewParcel>,
) -> Result<Response, AppError> {
    let response = match lifecycle::create_parcel(&state, &actor, payload)? {
        Submission::Created(parcel) => (StatusCode::CREATED, Json(parcel)).into_response(),
        Submission::PendingApproval(message) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "pending_approval",
                "message": message,
            })),
        )
            .into_response(),
    };

    Ok(response)
}

async fn list_parcels(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Json<Vec<Parcel>> {
    Json(lifecycle::list_parcels(&state, &actor))
}

async fn track_parcel(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<Parcel>, AppError> {
    lifecycle::track_parcel(&state, &tracking_id).map(Json)
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Parcel>, AppError> {
    lifecycle::update_status(&state, &actor, id, payload.status, payload.location).map(Json)
}

async fn assign_rider(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<AssignRiderRequest>,
) -> Result<Json<Parcel>, AppError> {
    lifecycle::assign_rider(&state, &actor, payload.parcel_id, payload.rider_id).map(Json)
}

async fn party_report(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Json<PartyReport> {
    Json(reports::party_report(&state, &actor))
}

async fn analytics(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Analytics>, AppError> {
    reports::analytics(&state, &actor).map(Json)
}

async fn plan_route(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RoutePlan>, AppError> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    route::plan_route(&state, &actor, date).map(Json)
}
