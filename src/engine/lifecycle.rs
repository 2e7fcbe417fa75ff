use chrono::{Local, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::capacity::TourSlot;
use crate::engine::relay;
use crate::error::AppError;
use crate::models::event::{ParcelEvent, ParcelEventKind};
use crate::models::message::Message;
use crate::models::parcel::{NewParcel, Parcel, ParcelStatus};
use crate::models::user::{Actor, Role};
use crate::state::AppState;

pub const MAIN_OFFICE_LOCATION: &str = "Main Office";
pub const NEXT_DAY_NOTE: &str = "Scheduled for Next Day";
const UNKNOWN_LOCATION: &str = "Unknown";
const MAX_TRACKING_ID_ATTEMPTS: usize = 8;

/// Result of submitting a new parcel.
#[derive(Debug, Clone)]
pub enum Submission {
    Created(Parcel),
    PendingApproval(Message),
}

/// Admins create parcels directly; branch heads file an approval request
/// with the main admin instead.
pub fn create_parcel(
    state: &AppState,
    actor: &Actor,
    payload: NewParcel,
) -> Result<Submission, AppError> {
    payload.validate()?;

    match actor.role {
        Role::MainAdmin => {
            let parcel = insert_parcel(
                state,
                payload,
                Some(actor.id),
                ParcelStatus::InMainBranch,
            )?;
            Ok(Submission::Created(parcel))
        }
        Role::BranchHead => {
            let content = format!(
                "Parcel creation request from {} for {} ({})",
                actor.name, payload.receiver_info.name, payload.receiver_info.address
            );
            let message = relay::send(state, actor, content, Role::MainAdmin, Some(payload))?;
            info!(message_id = %message.id, requested_by = %actor.id, "parcel request sent for approval");
            Ok(Submission::PendingApproval(message))
        }
        role => {
            warn!(user_id = %actor.id, role = %role, "parcel creation rejected");
            Err(AppError::Forbidden(format!("{role} cannot create parcels")))
        }
    }
}

/// Stores a new parcel with a freshly reserved tracking id and a branch
/// resolved from the receiver address.
pub(crate) fn insert_parcel(
    state: &AppState,
    payload: NewParcel,
    created_by: Option<Uuid>,
    initial_status: ParcelStatus,
) -> Result<Parcel, AppError> {
    let parcel_id = Uuid::new_v4();
    let tracking_id = reserve_tracking_id(state, parcel_id)?;
    let branch_id = state.branches.resolve(&payload.receiver_info.address);

    let location = match initial_status {
        ParcelStatus::InMainBranch => MAIN_OFFICE_LOCATION.to_string(),
        _ => branch_id
            .and_then(|id| state.branches.get(id))
            .map(|branch| branch.branch_name)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
    };

    let now = Utc::now();
    let mut parcel = Parcel {
        id: parcel_id,
        tracking_id,
        sender_info: payload.sender_info,
        receiver_info: payload.receiver_info,
        branch_id,
        rider_id: None,
        created_by,
        status: initial_status,
        weight: payload.weight,
        parcel_type: payload.parcel_type,
        cod_amount: payload.cod_amount,
        tour_date: None,
        schedule_note: None,
        history: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    parcel.record(initial_status, location, created_by);

    state.parcels.insert(parcel.id, parcel.clone());
    state.metrics.parcels_created_total.inc();
    publish(state, ParcelEventKind::Created, &parcel);

    info!(
        parcel_id = %parcel.id,
        tracking_id = %parcel.tracking_id,
        branch_id = ?parcel.branch_id,
        status = %parcel.status,
        "parcel created"
    );

    Ok(parcel)
}

fn reserve_tracking_id(state: &AppState, parcel_id: Uuid) -> Result<String, AppError> {
    for _ in 0..MAX_TRACKING_ID_ATTEMPTS {
        let candidate = state.tracking_ids.next_id();
        match state.tracking_index.entry(candidate) {
            Entry::Vacant(entry) => {
                let tracking_id = entry.key().clone();
                entry.insert(parcel_id);
                return Ok(tracking_id);
            }
            Entry::Occupied(entry) => {
                warn!(tracking_id = %entry.key(), "tracking id collision, regenerating");
            }
        }
    }

    Err(AppError::Internal("could not allocate a unique tracking id".to_string()))
}

pub fn update_status(
    state: &AppState,
    actor: &Actor,
    parcel_id: Uuid,
    status: ParcelStatus,
    location: Option<String>,
) -> Result<Parcel, AppError> {
    let location = location
        .map(|location| location.trim().to_string())
        .filter(|location| !location.is_empty())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

    let parcel = {
        let mut parcel = state
            .parcels
            .get_mut(&parcel_id)
            .ok_or_else(|| parcel_not_found(parcel_id))?;

        if !can_handle(actor, &parcel) {
            warn!(parcel_id = %parcel_id, user_id = %actor.id, "status update rejected: not permitted");
            return Err(AppError::Forbidden(format!(
                "{} cannot update parcel {}",
                actor.role, parcel.tracking_id
            )));
        }

        if !parcel.status.can_transition_to(status) {
            warn!(
                parcel_id = %parcel_id,
                from = %parcel.status,
                to = %status,
                "status update rejected: illegal transition"
            );
            return Err(AppError::InvalidTransition {
                from: parcel.status,
                to: status,
            });
        }

        parcel.record(status, location, Some(actor.id));
        parcel.clone()
    };

    state
        .metrics
        .status_updates_total
        .with_label_values(&[status.as_str()])
        .inc();
    publish(state, ParcelEventKind::StatusChanged, &parcel);

    info!(
        parcel_id = %parcel.id,
        tracking_id = %parcel.tracking_id,
        status = %parcel.status,
        "parcel status updated"
    );

    Ok(parcel)
}

pub fn assign_rider(
    state: &AppState,
    actor: &Actor,
    parcel_id: Uuid,
    rider_id: Uuid,
) -> Result<Parcel, AppError> {
    assign_rider_on(state, actor, parcel_id, rider_id, Local::now().date_naive())
}

/// Assigns `rider_id` for the tour of `today`, or of the following day once
/// the rider's daily capacity is used up.
///
/// A deferred parcel keeps its current status; only the tour date and the
/// schedule note change.
pub fn assign_rider_on(
    state: &AppState,
    actor: &Actor,
    parcel_id: Uuid,
    rider_id: Uuid,
    today: NaiveDate,
) -> Result<Parcel, AppError> {
    let rider = state
        .users
        .get(&rider_id)
        .map(|user| user.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;

    if rider.role != Role::DeliveryPerson {
        return Err(AppError::Validation(format!(
            "user {rider_id} is not a delivery person"
        )));
    }

    let (parcel, slot) = {
        let mut parcel = state
            .parcels
            .get_mut(&parcel_id)
            .ok_or_else(|| parcel_not_found(parcel_id))?;

        let may_assign = match actor.role {
            Role::MainAdmin => true,
            Role::BranchHead => parcel.branch_id.is_some() && parcel.branch_id == actor.branch_id,
            _ => false,
        };
        if !may_assign {
            return Err(AppError::Forbidden(format!(
                "{} cannot assign riders to parcel {}",
                actor.role, parcel.tracking_id
            )));
        }

        let reassignment = parcel.status == ParcelStatus::OutForDelivery;
        if !reassignment && !parcel.status.can_transition_to(ParcelStatus::OutForDelivery) {
            return Err(AppError::InvalidTransition {
                from: parcel.status,
                to: ParcelStatus::OutForDelivery,
            });
        }

        if let (Some(previous_rider), Some(previous_day)) = (parcel.rider_id, parcel.tour_date) {
            state.rider_ledger.release(previous_rider, previous_day);
        }

        let slot = state.rider_ledger.reserve(rider.id, today)?;
        parcel.rider_id = Some(rider.id);
        parcel.tour_date = Some(slot.date());

        match slot {
            TourSlot::SameDay(_) => {
                parcel.schedule_note = None;
                parcel.record(
                    ParcelStatus::OutForDelivery,
                    format!("Assigned to Rider {}", rider.name),
                    Some(actor.id),
                );
            }
            TourSlot::NextDay(_) => {
                parcel.schedule_note = Some(NEXT_DAY_NOTE.to_string());
                let current = parcel.status;
                parcel.record(current, NEXT_DAY_NOTE, Some(actor.id));
            }
        }

        (parcel.clone(), slot)
    };

    let (outcome, kind) = match slot {
        TourSlot::SameDay(_) => ("same_day", ParcelEventKind::RiderAssigned),
        TourSlot::NextDay(_) => ("next_day", ParcelEventKind::ScheduledNextDay),
    };
    state
        .metrics
        .rider_assignments_total
        .with_label_values(&[outcome])
        .inc();
    publish(state, kind, &parcel);

    info!(
        parcel_id = %parcel.id,
        rider_id = %rider.id,
        tour_date = %slot.date(),
        outcome,
        "rider assigned"
    );

    Ok(parcel)
}

pub fn track_parcel(state: &AppState, tracking_id: &str) -> Result<Parcel, AppError> {
    state
        .tracking_index
        .get(tracking_id)
        .and_then(|parcel_id| state.parcels.get(parcel_id.value()).map(|p| p.value().clone()))
        .ok_or_else(|| AppError::NotFound(format!("parcel {tracking_id} not found")))
}

/// Parcels the actor may see, newest first.
pub fn list_parcels(state: &AppState, actor: &Actor) -> Vec<Parcel> {
    let mut parcels: Vec<Parcel> = state
        .parcels
        .iter()
        .filter(|entry| can_view(actor, entry.value()))
        .map(|entry| entry.value().clone())
        .collect();

    parcels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    parcels
}

pub fn can_view(actor: &Actor, parcel: &Parcel) -> bool {
    match actor.role {
        Role::MainAdmin => true,
        Role::BranchHead => parcel.branch_id.is_some() && parcel.branch_id == actor.branch_id,
        Role::DeliveryPerson => parcel.rider_id == Some(actor.id),
        Role::Regular | Role::Guest => parcel.is_sent_by(actor) || parcel.is_received_by(actor),
    }
}

fn can_handle(actor: &Actor, parcel: &Parcel) -> bool {
    match actor.role {
        Role::Regular | Role::Guest => false,
        _ => can_view(actor, parcel),
    }
}

fn parcel_not_found(parcel_id: Uuid) -> AppError {
    AppError::NotFound(format!("parcel {parcel_id} not found"))
}

fn publish(state: &AppState, kind: ParcelEventKind, parcel: &Parcel) {
    let _ = state
        .parcel_events_tx
        .send(ParcelEvent::from_parcel(kind, parcel));
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{
        assign_rider_on, create_parcel, list_parcels, track_parcel, update_status, Submission,
        NEXT_DAY_NOTE,
    };
    use crate::engine::test_support::{branch_id, payload, seeded_state, user};
    use crate::error::AppError;
    use crate::models::parcel::{Parcel, ParcelStatus};
    use crate::models::user::Role;

    fn created(submission: Submission) -> Parcel {
        match submission {
            Submission::Created(parcel) => parcel,
            Submission::PendingApproval(message) => panic!("expected a parcel, got {message:?}"),
        }
    }

    fn assert_history_consistent(parcel: &Parcel) {
        let last = parcel.history.last().expect("history is never empty");
        assert_eq!(last.status, parcel.status);
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn admin_parcel_starts_in_main_branch_at_resolved_branch() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);

        let parcel = created(
            create_parcel(&state, &admin, payload("456 Main Street, Kandy")).unwrap(),
        );

        assert_eq!(parcel.status, ParcelStatus::InMainBranch);
        assert_eq!(parcel.branch_id, Some(branch_id(&state, "Kandy Branch")));
        assert_eq!(parcel.history.len(), 1);
        assert_eq!(parcel.history[0].location, "Main Office");
        assert_history_consistent(&parcel);
    }

    #[test]
    fn branch_head_submission_creates_message_not_parcel() {
        let state = seeded_state(10);
        let head = user(&state, "Head", Role::BranchHead, Some("Kandy Branch"));

        let submission = create_parcel(&state, &head, payload("Kandy")).unwrap();

        assert!(matches!(submission, Submission::PendingApproval(_)));
        assert!(state.parcels.is_empty());
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn customers_cannot_create_parcels() {
        let state = seeded_state(10);
        let customer = user(&state, "Customer", Role::Regular, None);

        let result = create_parcel(&state, &customer, payload("Galle"));
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn update_status_appends_exactly_one_entry() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());

        let updated = update_status(
            &state,
            &admin,
            parcel.id,
            ParcelStatus::Transmitting,
            Some("Colombo sorting hub".to_string()),
        )
        .unwrap();

        assert_eq!(updated.history.len(), parcel.history.len() + 1);
        let last = updated.history.last().unwrap();
        assert_eq!(last.status, ParcelStatus::Transmitting);
        assert_eq!(last.location, "Colombo sorting hub");
        assert_eq!(last.updated_by, Some(admin.id));
        assert_history_consistent(&updated);
    }

    #[test]
    fn blank_location_becomes_unknown() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());

        let updated =
            update_status(&state, &admin, parcel.id, ParcelStatus::Returned, Some(" ".into()))
                .unwrap();
        assert_eq!(updated.history.last().unwrap().location, "Unknown");
    }

    #[test]
    fn illegal_transition_leaves_parcel_untouched() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());
        update_status(&state, &admin, parcel.id, ParcelStatus::Returned, None).unwrap();

        let err = update_status(&state, &admin, parcel.id, ParcelStatus::InMainBranch, None)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: ParcelStatus::Returned,
                to: ParcelStatus::InMainBranch
            }
        ));

        let stored = state.parcels.get(&parcel.id).unwrap().clone();
        assert_eq!(stored.status, ParcelStatus::Returned);
        assert_eq!(stored.history.len(), 2);
    }

    #[test]
    fn unknown_parcel_is_not_found() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);

        let err = update_status(&state, &admin, Uuid::new_v4(), ParcelStatus::Delivered, None)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn rider_may_only_update_own_parcels() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let rider = user(&state, "Rider", Role::DeliveryPerson, Some("Galle Branch"));
        let other = user(&state, "Other", Role::DeliveryPerson, Some("Galle Branch"));
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());
        assign_rider_on(&state, &admin, parcel.id, rider.id, day()).unwrap();

        let denied = update_status(&state, &other, parcel.id, ParcelStatus::Delivered, None);
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let delivered =
            update_status(&state, &rider, parcel.id, ParcelStatus::Delivered, None).unwrap();
        assert_eq!(delivered.status, ParcelStatus::Delivered);
    }

    #[test]
    fn assignment_over_capacity_defers_to_tomorrow() {
        let capacity = 2;
        let state = seeded_state(capacity);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let rider = user(&state, "Rider", Role::DeliveryPerson, Some("Kandy Branch"));
        let tomorrow = day().succ_opt().unwrap();

        let assigned: Vec<Parcel> = (0..=capacity)
            .map(|_| {
                let parcel = created(create_parcel(&state, &admin, payload("Kandy")).unwrap());
                assign_rider_on(&state, &admin, parcel.id, rider.id, day()).unwrap()
            })
            .collect();

        for parcel in &assigned[..capacity as usize] {
            assert_eq!(parcel.tour_date, Some(day()));
            assert_eq!(parcel.status, ParcelStatus::OutForDelivery);
            assert!(parcel.schedule_note.is_none());
            assert_history_consistent(parcel);
        }

        let deferred = assigned.last().unwrap();
        assert_eq!(deferred.tour_date, Some(tomorrow));
        assert_eq!(deferred.schedule_note.as_deref(), Some(NEXT_DAY_NOTE));
        assert_eq!(deferred.status, ParcelStatus::InMainBranch);
        assert_eq!(deferred.history.last().unwrap().location, NEXT_DAY_NOTE);
        assert_eq!(deferred.rider_id, Some(rider.id));
        assert_history_consistent(deferred);
    }

    #[test]
    fn reassignment_frees_previous_riders_slot() {
        let state = seeded_state(1);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let first = user(&state, "First", Role::DeliveryPerson, None);
        let second = user(&state, "Second", Role::DeliveryPerson, None);
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());

        assign_rider_on(&state, &admin, parcel.id, first.id, day()).unwrap();
        let reassigned = assign_rider_on(&state, &admin, parcel.id, second.id, day()).unwrap();

        assert_eq!(reassigned.rider_id, Some(second.id));
        assert_eq!(state.rider_ledger.load(first.id, day()), 0);
        assert_eq!(state.rider_ledger.load(second.id, day()), 1);
    }

    #[test]
    fn assigning_a_non_rider_is_rejected() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());

        let result = assign_rider_on(&state, &admin, parcel.id, admin.id, day());
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = assign_rider_on(&state, &admin, parcel.id, Uuid::new_v4(), day());
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn branch_head_assigns_only_within_branch() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let galle_head = user(&state, "Galle Head", Role::BranchHead, Some("Galle Branch"));
        let rider = user(&state, "Rider", Role::DeliveryPerson, Some("Kandy Branch"));
        let parcel = created(create_parcel(&state, &admin, payload("Kandy")).unwrap());

        let result = assign_rider_on(&state, &galle_head, parcel.id, rider.id, day());
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn concurrent_assignments_respect_capacity() {
        let capacity = 3;
        let state = Arc::new(seeded_state(capacity));
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let rider = user(&state, "Rider", Role::DeliveryPerson, None);

        let parcel_ids: Vec<Uuid> = (0..12)
            .map(|_| created(create_parcel(&state, &admin, payload("Galle")).unwrap()).id)
            .collect();

        let handles: Vec<_> = parcel_ids
            .into_iter()
            .map(|parcel_id| {
                let state = state.clone();
                let admin = admin.clone();
                std::thread::spawn(move || {
                    assign_rider_on(&state, &admin, parcel_id, rider.id, day()).unwrap()
                })
            })
            .collect();

        let same_day = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|parcel| parcel.tour_date == Some(day()))
            .count();

        assert_eq!(same_day, capacity as usize);
    }

    #[test]
    fn concurrent_creation_yields_distinct_tracking_ids() {
        let state = Arc::new(seeded_state(10));
        let admin = user(&state, "Admin", Role::MainAdmin, None);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                let admin = admin.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| {
                            created(create_parcel(&state, &admin, payload("Kandy")).unwrap())
                                .tracking_id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 200);
        assert_eq!(state.parcels.len(), 200);
    }

    #[test]
    fn tracking_lookup_is_exact() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let parcel = created(create_parcel(&state, &admin, payload("Galle")).unwrap());

        let found = track_parcel(&state, &parcel.tracking_id).unwrap();
        assert_eq!(found.tracking_id, parcel.tracking_id);

        assert!(matches!(track_parcel(&state, "NV-0000"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn listing_is_filtered_by_role() {
        let state = seeded_state(10);
        let admin = user(&state, "Admin", Role::MainAdmin, None);
        let kandy_head = user(&state, "Kandy Head", Role::BranchHead, Some("Kandy Branch"));
        let rider = user(&state, "Rider", Role::DeliveryPerson, Some("Galle Branch"));
        let customer = user(&state, "Customer", Role::Regular, None);

        let kandy = created(create_parcel(&state, &admin, payload("Kandy")).unwrap());
        let galle = created(create_parcel(&state, &admin, payload("Galle")).unwrap());
        assign_rider_on(&state, &admin, galle.id, rider.id, day()).unwrap();

        let mut for_customer = payload("Galle");
        for_customer.receiver_info.contact = customer.email.clone();
        let customer_parcel = created(create_parcel(&state, &admin, for_customer).unwrap());

        assert_eq!(list_parcels(&state, &admin).len(), 3);

        let head_view: Vec<Uuid> = list_parcels(&state, &kandy_head).iter().map(|p| p.id).collect();
        assert_eq!(head_view, vec![kandy.id]);

        let rider_view: Vec<Uuid> = list_parcels(&state, &rider).iter().map(|p| p.id).collect();
        assert_eq!(rider_view, vec![galle.id]);

        let customer_view: Vec<Uuid> =
            list_parcels(&state, &customer).iter().map(|p| p.id).collect();
        assert_eq!(customer_view, vec![customer_parcel.id]);
    }
}
