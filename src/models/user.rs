use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    #[default]
    Regular,
    DeliveryPerson,
    BranchHead,
    MainAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Regular => "regular",
            Role::DeliveryPerson => "delivery_person",
            Role::BranchHead => "branch_head",
            Role::MainAdmin => "main_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub branch_id: Option<Uuid>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Identity of the caller for a single request.
///
/// Built from the bearer token by the auth extractor and handed to every
/// engine operation; nothing in the engine looks up "the current user" on its
/// own.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub branch_id: Option<Uuid>,
}

impl Actor {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Whether `contact` or `name` on a parcel identifies this actor.
    pub fn matches_party(&self, name: &str, contact: &str) -> bool {
        contact.trim().eq_ignore_ascii_case(&self.email) || name.trim() == self.name
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            branch_id: user.branch_id,
        }
    }
}
