use rand::Rng;

use crate::models::branch::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

const KNOWN_CITIES: &[(&str, GeoPoint)] = &[
    ("colombo", GeoPoint { lat: 6.9271, lng: 79.8612 }),
    ("kandy", GeoPoint { lat: 7.2906, lng: 80.6337 }),
    ("galle", GeoPoint { lat: 6.0535, lng: 80.2210 }),
    ("jaffna", GeoPoint { lat: 9.6615, lng: 80.0255 }),
    ("negombo", GeoPoint { lat: 7.2088, lng: 79.8359 }),
];

const FALLBACK_POINT: GeoPoint = GeoPoint { lat: 6.9, lng: 79.8 };
const CITY_JITTER_DEG: f64 = 0.05;
const FALLBACK_JITTER_DEG: f64 = 0.1;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Mock geocoder: finds a known city name inside the address and scatters
/// the point a little so stops in the same city do not overlap on a map.
#[derive(Debug, Default, Clone)]
pub struct CityGeocoder;

impl CityGeocoder {
    pub fn locate(&self, address: &str) -> GeoPoint {
        let address = address.to_lowercase();
        let (center, spread) = KNOWN_CITIES
            .iter()
            .find(|(city, _)| address.contains(city))
            .map(|(_, point)| (*point, CITY_JITTER_DEG))
            .unwrap_or((FALLBACK_POINT, FALLBACK_JITTER_DEG));

        jitter(center, spread)
    }
}

fn jitter(center: GeoPoint, spread: f64) -> GeoPoint {
    let mut rng = rand::thread_rng();
    GeoPoint {
        lat: center.lat + rng.gen_range(-0.5_f64..0.5) * spread,
        lng: center.lng + rng.gen_range(-0.5_f64..0.5) * spread,
    }
}
