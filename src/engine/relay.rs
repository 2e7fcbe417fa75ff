use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::message::Message;
use crate::models::parcel::{NewParcel, Parcel, ParcelStatus};
use crate::models::user::{Actor, Role};
use crate::state::AppState;

pub fn send(
    state: &AppState,
    sender: &Actor,
    content: String,
    receiver_role: Role,
    parcel_data: Option<NewParcel>,
) -> Result<Message, AppError> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }
    if let Some(payload) = &parcel_data {
        payload.validate()?;
    }

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: Some(sender.id),
        content,
        parcel_data,
        receiver_role,
        is_read: false,
        parcel_id: None,
        created_at: Utc::now(),
    };

    state.messages.insert(message.id, message.clone());
    if awaits_approval(&message) {
        state.metrics.pending_approvals.inc();
    }
    info!(message_id = %message.id, to = %receiver_role, "message sent");

    Ok(message)
}

/// Messages addressed to `role`, newest first.
pub fn list_for(state: &AppState, role: Role) -> Vec<Message> {
    let mut messages: Vec<Message> = state
        .messages
        .iter()
        .filter(|entry| entry.receiver_role == role)
        .map(|entry| entry.value().clone())
        .collect();

    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    messages
}

/// Only members of the addressed role may mark a message read.
pub fn mark_read(state: &AppState, reader: &Actor, message_id: Uuid) -> Result<Message, AppError> {
    let mut message = state
        .messages
        .get_mut(&message_id)
        .ok_or_else(|| message_not_found(message_id))?;

    if message.receiver_role != reader.role {
        warn!(message_id = %message_id, user_id = %reader.id, "mark read rejected: not the recipient");
        return Err(AppError::Forbidden(format!(
            "message {message_id} is not addressed to {}",
            reader.role
        )));
    }

    message.is_read = true;
    Ok(message.clone())
}

/// Creates the parcel carried by a request message and consumes the message.
///
/// The message entry stays locked until the parcel exists, so two admins
/// approving at once cannot both create it, and a failed creation leaves the
/// message unread and unconsumed.
pub fn approve_and_create(
    state: &AppState,
    approver: &Actor,
    message_id: Uuid,
) -> Result<Parcel, AppError> {
    if !approver.is(Role::MainAdmin) {
        return Err(AppError::Forbidden(
            "only the main admin can approve parcel requests".to_string(),
        ));
    }

    let mut message = state
        .messages
        .get_mut(&message_id)
        .ok_or_else(|| message_not_found(message_id))?;

    if message.receiver_role != Role::MainAdmin {
        return Err(AppError::Validation(format!(
            "message {message_id} is not addressed to the main admin"
        )));
    }

    if let Some(parcel_id) = message.parcel_id {
        warn!(message_id = %message_id, parcel_id = %parcel_id, "request already approved");
        return Err(AppError::Conflict(format!(
            "request {message_id} was already approved as parcel {parcel_id}"
        )));
    }

    let payload = message
        .parcel_data
        .clone()
        .ok_or_else(|| AppError::Validation(format!("message {message_id} carries no parcel request")))?;

    let requester_role = message
        .sender_id
        .and_then(|sender_id| state.users.get(&sender_id).map(|user| user.role));
    let initial_status = match requester_role {
        Some(Role::BranchHead) => ParcelStatus::InSubBranch,
        _ => ParcelStatus::InMainBranch,
    };
    let created_by = message.sender_id.or(Some(approver.id));

    let parcel = lifecycle::insert_parcel(state, payload, created_by, initial_status)?;

    message.parcel_id = Some(parcel.id);
    message.is_read = true;
    drop(message);

    state.metrics.pending_approvals.dec();
    info!(
        message_id = %message_id,
        parcel_id = %parcel.id,
        approved_by = %approver.id,
        "parcel request approved"
    );

    Ok(parcel)
}

fn awaits_approval(message: &Message) -> bool {
    message.receiver_role == Role::MainAdmin && message.parcel_data.is_some()
}

fn message_not_found(message_id: Uuid) -> AppError {
    AppError::NotFound(format!("message {message_id} not found"))
}
