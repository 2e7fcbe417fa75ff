use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::parcel::{Parcel, ParcelStatus};
use crate::models::user::{Actor, Role};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartyStats {
    pub sent: usize,
    pub received: usize,
    pub delivered: usize,
    pub returned: usize,
    pub in_transit: usize,
    /// COD collected on parcels the actor sent.
    pub cod_as_sender: f64,
    /// COD the actor pays on parcels addressed to them.
    pub cod_as_receiver: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyReport {
    pub stats: PartyStats,
    pub parcels: Vec<Parcel>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RiderPerformance {
    pub assigned: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_parcels: usize,
    pub delivered: usize,
    pub returned: usize,
    pub pending: usize,
    pub total_cod: f64,
    pub branch_breakdown: BTreeMap<String, usize>,
    pub rider_performance: BTreeMap<String, RiderPerformance>,
}

/// Sender/receiver summary for the parcels the actor is a party to.
pub fn party_report(state: &AppState, actor: &Actor) -> PartyReport {
    let mut stats = PartyStats::default();
    let mut parcels = Vec::new();

    for entry in state.parcels.iter() {
        let parcel = entry.value();
        let sent = parcel.is_sent_by(actor);
        let received = parcel.is_received_by(actor);
        if !sent && !received {
            continue;
        }

        if sent {
            stats.sent += 1;
            stats.cod_as_sender += parcel.cod_amount;
        }
        if received {
            stats.received += 1;
            stats.cod_as_receiver += parcel.cod_amount;
        }
        match parcel.status {
            ParcelStatus::Delivered => stats.delivered += 1,
            ParcelStatus::Returned => stats.returned += 1,
            _ => stats.in_transit += 1,
        }

        parcels.push(parcel.clone());
    }

    parcels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    PartyReport { stats, parcels }
}

/// System-wide figures for the main admin.
pub fn analytics(state: &AppState, actor: &Actor) -> Result<Analytics, AppError> {
    if !actor.is(Role::MainAdmin) {
        return Err(AppError::Forbidden("analytics are restricted to the main admin".to_string()));
    }

    let branch_names: HashMap<Uuid, String> = state
        .branches
        .list()
        .into_iter()
        .map(|branch| (branch.id, branch.branch_name))
        .collect();

    let mut report = Analytics::default();
    for entry in state.parcels.iter() {
        let parcel = entry.value();
        report.total_parcels += 1;
        report.total_cod += parcel.cod_amount;

        match parcel.status {
            ParcelStatus::Delivered => report.delivered += 1,
            ParcelStatus::Returned => report.returned += 1,
            _ => report.pending += 1,
        }

        let branch = parcel
            .branch_id
            .and_then(|id| branch_names.get(&id).cloned())
            .unwrap_or_else(|| "Unassigned".to_string());
        *report.branch_breakdown.entry(branch).or_default() += 1;

        if let Some(rider_id) = parcel.rider_id {
            let rider = state
                .users
                .get(&rider_id)
                .map(|user| user.name.clone())
                .unwrap_or_else(|| rider_id.to_string());
            let performance = report.rider_performance.entry(rider).or_default();
            performance.assigned += 1;
            if parcel.status == ParcelStatus::Delivered {
                performance.delivered += 1;
            }
        }
    }

    Ok(report)
}
