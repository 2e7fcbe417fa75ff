use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::Actor;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ParcelStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In Main Branch")]
    InMainBranch,
    #[serde(rename = "Transmitting")]
    Transmitting,
    #[serde(rename = "In Sub Branch")]
    InSubBranch,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    #[serde(rename = "Delivered")]
    Delivered,
    #[serde(rename = "Returned")]
    Returned,
}

impl ParcelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Pending => "Pending",
            ParcelStatus::InMainBranch => "In Main Branch",
            ParcelStatus::Transmitting => "Transmitting",
            ParcelStatus::InSubBranch => "In Sub Branch",
            ParcelStatus::OutForDelivery => "Out for Delivery",
            ParcelStatus::Delivered => "Delivered",
            ParcelStatus::Returned => "Returned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ParcelStatus::Delivered | ParcelStatus::Returned)
    }

    /// Statuses reachable from `self` in a single step.
    pub fn next_states(&self) -> &'static [ParcelStatus] {
        use ParcelStatus::*;

        match self {
            Pending => &[InMainBranch, InSubBranch, Returned],
            InMainBranch => &[Transmitting, OutForDelivery, Returned],
            Transmitting => &[InSubBranch, Returned],
            InSubBranch => &[Transmitting, OutForDelivery, Returned],
            OutForDelivery => &[Delivered, Returned, InSubBranch],
            Delivered | Returned => &[],
        }
    }

    pub fn can_transition_to(&self, next: ParcelStatus) -> bool {
        self.next_states().contains(&next)
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    pub name: String,
    pub address: String,
    pub contact: String,
}

impl ContactInfo {
    fn validate(&self, party: &str) -> Result<(), AppError> {
        for (field, value) in [
            ("name", &self.name),
            ("address", &self.address),
            ("contact", &self.contact),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{party} {field} cannot be empty")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub status: ParcelStatus,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

/// Creation payload, either submitted directly or embedded in an approval
/// request message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewParcel {
    pub sender_info: ContactInfo,
    pub receiver_info: ContactInfo,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(rename = "type", default)]
    pub parcel_type: Option<String>,
    #[serde(default)]
    pub cod_amount: f64,
}

impl NewParcel {
    pub fn validate(&self) -> Result<(), AppError> {
        self.sender_info.validate("sender")?;
        self.receiver_info.validate("receiver")?;

        if let Some(weight) = self.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Validation("weight must be >= 0".to_string()));
            }
        }

        if !self.cod_amount.is_finite() || self.cod_amount < 0.0 {
            return Err(AppError::Validation("codAmount must be >= 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: Uuid,
    pub tracking_id: String,
    pub sender_info: ContactInfo,
    pub receiver_info: ContactInfo,
    pub branch_id: Option<Uuid>,
    pub rider_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub status: ParcelStatus,
    pub weight: Option<f64>,
    #[serde(rename = "type")]
    pub parcel_type: Option<String>,
    pub cod_amount: f64,
    pub tour_date: Option<NaiveDate>,
    pub schedule_note: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Parcel {
    /// Sets `status` and appends the matching history entry.
    ///
    /// This is the only place status changes, which keeps the last history
    /// entry in step with the current status.
    pub fn record(&mut self, status: ParcelStatus, location: impl Into<String>, updated_by: Option<Uuid>) {
        let now = Utc::now();
        self.status = status;
        self.history.push(HistoryEntry {
            status,
            location: location.into(),
            timestamp: now,
            updated_by,
        });
        self.updated_at = now;
    }

    pub fn is_sent_by(&self, actor: &Actor) -> bool {
        actor.matches_party(&self.sender_info.name, &self.sender_info.contact)
    }

    pub fn is_received_by(&self, actor: &Actor) -> bool {
        actor.matches_party(&self.receiver_info.name, &self.receiver_info.contact)
    }
}
