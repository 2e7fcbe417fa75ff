use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::parcel::NewParcel;
use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Option<Uuid>,
    pub content: String,
    pub parcel_data: Option<NewParcel>,
    pub receiver_role: Role,
    pub is_read: bool,
    /// Set once the embedded parcel request has been approved.
    pub parcel_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
