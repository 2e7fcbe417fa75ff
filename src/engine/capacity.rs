use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourSlot {
    SameDay(NaiveDate),
    NextDay(NaiveDate),
}

impl TourSlot {
    pub fn date(&self) -> NaiveDate {
        match self {
            TourSlot::SameDay(date) | TourSlot::NextDay(date) => *date,
        }
    }
}

/// Per-rider, per-day count of assigned parcels.
///
/// The check against the daily cap and the increment happen while the map
/// entry is held, so concurrent reservations for the same rider and day
/// cannot both slip under the cap.
///
/// Days before the latest `today` seen by `reserve` are dropped once per day.
pub struct RiderLedger {
    loads: DashMap<(Uuid, NaiveDate), u32>,
    daily_capacity: u32,
    pruned_through: AtomicI32,
}

impl RiderLedger {
    pub fn new(daily_capacity: u32) -> Self {
        Self {
            loads: DashMap::new(),
            daily_capacity,
            pruned_through: AtomicI32::new(i32::MIN),
        }
    }

    pub fn reserve(&self, rider_id: Uuid, today: NaiveDate) -> Result<TourSlot, AppError> {
        self.prune_before(today);

        {
            let mut load = self.loads.entry((rider_id, today)).or_insert(0);
            if *load < self.daily_capacity {
                *load += 1;
                return Ok(TourSlot::SameDay(today));
            }
        }

        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| AppError::Internal(format!("no calendar day after {today}")))?;
        *self.loads.entry((rider_id, tomorrow)).or_insert(0) += 1;

        Ok(TourSlot::NextDay(tomorrow))
    }

    fn prune_before(&self, today: NaiveDate) {
        let day = today.num_days_from_ce();
        if self.pruned_through.fetch_max(day, Ordering::AcqRel) < day {
            self.loads.retain(|(_, load_day), _| *load_day >= today);
        }
    }

    pub fn release(&self, rider_id: Uuid, day: NaiveDate) {
        if let Some(mut load) = self.loads.get_mut(&(rider_id, day)) {
            *load = load.saturating_sub(1);
        }
    }

    pub fn load(&self, rider_id: Uuid, day: NaiveDate) -> u32 {
        self.loads
            .get(&(rider_id, day))
            .map(|load| *load)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{RiderLedger, TourSlot};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn overflow_rolls_to_next_day() {
        let ledger = RiderLedger::new(2);
        let rider = Uuid::new_v4();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();

        assert_eq!(ledger.reserve(rider, day()).unwrap(), TourSlot::SameDay(day()));
        assert_eq!(ledger.reserve(rider, day()).unwrap(), TourSlot::SameDay(day()));
        assert_eq!(ledger.reserve(rider, day()).unwrap(), TourSlot::NextDay(tomorrow));

        assert_eq!(ledger.load(rider, day()), 2);
        assert_eq!(ledger.load(rider, tomorrow), 1);
    }

    #[test]
    fn riders_have_independent_budgets() {
        let ledger = RiderLedger::new(1);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(matches!(ledger.reserve(first, day()).unwrap(), TourSlot::SameDay(_)));
        assert!(matches!(ledger.reserve(second, day()).unwrap(), TourSlot::SameDay(_)));
    }

    #[test]
    fn release_frees_a_slot() {
        let ledger = RiderLedger::new(1);
        let rider = Uuid::new_v4();

        ledger.reserve(rider, day()).unwrap();
        ledger.release(rider, day());

        assert_eq!(ledger.reserve(rider, day()).unwrap(), TourSlot::SameDay(day()));
    }

    #[test]
    fn past_days_are_dropped_on_a_new_day() {
        let ledger = RiderLedger::new(1);
        let rider = Uuid::new_v4();
        let later = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();

        ledger.reserve(rider, day()).unwrap();
        ledger.reserve(rider, day()).unwrap();
        assert_eq!(ledger.loads.len(), 2);

        assert_eq!(ledger.reserve(rider, later).unwrap(), TourSlot::SameDay(later));
        assert_eq!(ledger.load(rider, day()), 0);
        assert_eq!(ledger.loads.len(), 1);
    }

    #[test]
    fn concurrent_reservations_never_exceed_capacity() {
        let ledger = Arc::new(RiderLedger::new(5));
        let rider = Uuid::new_v4();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.reserve(rider, day()).unwrap())
            })
            .collect();

        let same_day = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|slot| matches!(slot, TourSlot::SameDay(_)))
            .count();

        assert_eq!(same_day, 5);
        assert_eq!(ledger.load(rider, day()), 5);
    }
}
