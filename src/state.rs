use argon2::Argon2;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::assistant::{Assistant, OfflineAssistant};
use crate::auth::token::JwtState;
use crate::config::Config;
use crate::engine::branches::{AddressResolver, BranchDirectory};
use crate::engine::capacity::RiderLedger;
use crate::engine::route::{LatitudeRanker, RouteRanker};
use crate::engine::tracking::TrackingIdGenerator;
use crate::geo::CityGeocoder;
use crate::models::event::ParcelEvent;
use crate::models::message::Message;
use crate::models::parcel::Parcel;
use crate::models::user::User;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub branches: BranchDirectory,
    pub users: DashMap<Uuid, User>,
    pub user_emails: DashMap<String, Uuid>,
    pub parcels: DashMap<Uuid, Parcel>,
    pub tracking_index: DashMap<String, Uuid>,
    pub messages: DashMap<Uuid, Message>,
    pub rider_ledger: RiderLedger,
    pub tracking_ids: TrackingIdGenerator,
    pub geocoder: CityGeocoder,
    pub route_ranker: Box<dyn RouteRanker>,
    pub assistant: Box<dyn Assistant>,
    pub argon: Argon2<'static>,
    pub jwt: JwtState,
    pub parcel_events_tx: broadcast::Sender<ParcelEvent>,
    pub metrics: Metrics,
    pub static_dir: String,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let (parcel_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        Self {
            branches: BranchDirectory::default(),
            users: DashMap::new(),
            user_emails: DashMap::new(),
            parcels: DashMap::new(),
            tracking_index: DashMap::new(),
            messages: DashMap::new(),
            rider_ledger: RiderLedger::new(config.rider_daily_capacity),
            tracking_ids: TrackingIdGenerator::new(),
            geocoder: CityGeocoder,
            route_ranker: Box::new(LatitudeRanker),
            assistant: Box::new(OfflineAssistant),
            argon: Argon2::default(),
            jwt: JwtState::new(&config.jwt_secret, config.token_ttl_hours),
            parcel_events_tx,
            metrics: Metrics::new(),
            static_dir: config.static_dir.clone(),
        }
    }

    /// Swaps the address matching strategy. Call before any branch is added.
    pub fn with_address_resolver(mut self, resolver: Box<dyn AddressResolver>) -> Self {
        self.branches = BranchDirectory::new(resolver);
        self
    }

    pub fn with_route_ranker(mut self, ranker: Box<dyn RouteRanker>) -> Self {
        self.route_ranker = ranker;
        self
    }

    pub fn with_assistant(mut self, assistant: Box<dyn Assistant>) -> Self {
        self.assistant = assistant;
        self
    }
}
