use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::branch::GeoPoint;
use crate::models::user::{Actor, Role};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub parcel_id: Uuid,
    pub tracking_id: String,
    pub receiver_name: String,
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub rider_id: Uuid,
    pub tour_date: NaiveDate,
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
}

/// Orders a rider's stops for the day.
pub trait RouteRanker: Send + Sync {
    fn rank(&self, stops: &mut Vec<RouteStop>);
}

/// North to south by latitude.
#[derive(Debug, Default)]
pub struct LatitudeRanker;

impl RouteRanker for LatitudeRanker {
    fn rank(&self, stops: &mut Vec<RouteStop>) {
        stops.sort_by(|a, b| b.location.lat.total_cmp(&a.location.lat));
    }
}

pub fn plan_route(state: &AppState, actor: &Actor, tour_date: NaiveDate) -> Result<RoutePlan, AppError> {
    if !actor.is(Role::DeliveryPerson) {
        return Err(AppError::Forbidden("routes are planned for delivery riders only".to_string()));
    }

    let mut stops: Vec<RouteStop> = state
        .parcels
        .iter()
        .filter(|entry| {
            let parcel = entry.value();
            parcel.rider_id == Some(actor.id)
                && parcel.tour_date == Some(tour_date)
                && !parcel.status.is_terminal()
        })
        .map(|entry| {
            let parcel = entry.value();
            RouteStop {
                parcel_id: parcel.id,
                tracking_id: parcel.tracking_id.clone(),
                receiver_name: parcel.receiver_info.name.clone(),
                address: parcel.receiver_info.address.clone(),
                location: state.geocoder.locate(&parcel.receiver_info.address),
            }
        })
        .collect();

    state.route_ranker.rank(&mut stops);

    let total_distance_km = stops
        .windows(2)
        .map(|pair| haversine_km(&pair[0].location, &pair[1].location))
        .sum();

    Ok(RoutePlan {
        rider_id: actor.id,
        tour_date,
        stops,
        total_distance_km,
    })
}
