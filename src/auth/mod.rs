pub mod password;
pub mod token;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::user::{Actor, PaymentStatus, Role, User};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

/// Caller identity extracted from `Authorization: Bearer <token>`.
///
/// The user record is looked up on every request so a token for a user that
/// no longer exists is rejected.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("invalid Authorization format".to_string()))?;

        let claims = state.jwt.decode(token.trim())?;
        let user = state
            .users
            .get(&claims.sub)
            .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))?;

        Ok(AuthUser(Actor::from(user.value())))
    }
}

pub fn register(state: &AppState, request: RegisterRequest) -> Result<AuthResponse, AppError> {
    let name = request.name.trim().to_string();
    let email = request.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if let Some(branch_id) = request.branch_id {
        if state.branches.get(branch_id).is_none() {
            return Err(AppError::Validation(format!("branch {branch_id} does not exist")));
        }
    }

    let password_hash = hash_password(&state.argon, &request.password)?;
    let user = User {
        id: Uuid::new_v4(),
        name,
        email: email.clone(),
        password_hash,
        role: request.role.unwrap_or_default(),
        branch_id: request.branch_id,
        payment_status: PaymentStatus::Unpaid,
        created_at: Utc::now(),
    };

    match state.user_emails.entry(email) {
        Entry::Occupied(entry) => {
            warn!(email = %entry.key(), "registration rejected: email taken");
            return Err(AppError::Conflict("user already exists".to_string()));
        }
        Entry::Vacant(entry) => {
            state.users.insert(user.id, user.clone());
            entry.insert(user.id);
        }
    }

    info!(user_id = %user.id, role = %user.role, "user registered");

    let token = state.jwt.issue(&user)?;
    Ok(AuthResponse { user, token })
}

pub fn login(state: &AppState, request: LoginRequest) -> Result<AuthResponse, AppError> {
    let invalid = || AppError::Unauthorized("invalid email or password".to_string());
    let email = request.email.trim().to_lowercase();

    let user_id = state.user_emails.get(&email).map(|id| *id).ok_or_else(invalid)?;
    let user = state
        .users
        .get(&user_id)
        .map(|user| user.value().clone())
        .ok_or_else(invalid)?;

    if !verify_password(&state.argon, &request.password, &user.password_hash) {
        warn!(user_id = %user.id, "login rejected: bad password");
        return Err(invalid());
    }

    info!(user_id = %user.id, role = %user.role, "user logged in");

    let token = state.jwt.issue(&user)?;
    Ok(AuthResponse { user, token })
}

pub fn profile(state: &AppState, actor: &Actor) -> Result<User, AppError> {
    state
        .users
        .get(&actor.id)
        .map(|user| user.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", actor.id)))
}

/// Flags a regular customer's account as paid.
pub fn mark_paid(state: &AppState, actor: &Actor) -> Result<AuthResponse, AppError> {
    if !actor.is(Role::Regular) {
        return Err(AppError::Forbidden(
            "only regular customers carry a payment status".to_string(),
        ));
    }

    let user = {
        let mut user = state
            .users
            .get_mut(&actor.id)
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", actor.id)))?;
        user.payment_status = PaymentStatus::Paid;
        user.clone()
    };

    info!(user_id = %user.id, "payment recorded");

    let token = state.jwt.issue(&user)?;
    Ok(AuthResponse { user, token })
}
