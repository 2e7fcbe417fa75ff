use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::parcel::{Parcel, ParcelStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParcelEventKind {
    Created,
    StatusChanged,
    RiderAssigned,
    ScheduledNextDay,
}

/// Pushed to websocket subscribers whenever a parcel changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelEvent {
    pub kind: ParcelEventKind,
    pub parcel_id: Uuid,
    pub tracking_id: String,
    pub status: ParcelStatus,
    pub location: String,
    pub at: DateTime<Utc>,
}

impl ParcelEvent {
    pub fn from_parcel(kind: ParcelEventKind, parcel: &Parcel) -> Self {
        let (location, at) = parcel
            .history
            .last()
            .map(|entry| (entry.location.clone(), entry.timestamp))
            .unwrap_or_else(|| (String::new(), parcel.updated_at));

        Self {
            kind,
            parcel_id: parcel.id,
            tracking_id: parcel.tracking_id.clone(),
            status: parcel.status,
            location,
            at,
        }
    }
}
