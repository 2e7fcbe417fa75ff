use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub parcels_created_total: IntCounter,
    pub status_updates_total: IntCounterVec,
    pub rider_assignments_total: IntCounterVec,
    pub pending_approvals: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let parcels_created_total =
            IntCounter::new("parcels_created_total", "Total parcels created")
                .expect("valid parcels_created_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new(
                "parcel_status_updates_total",
                "Parcel status updates by target status",
            ),
            &["status"],
        )
        .expect("valid parcel_status_updates_total metric");

        let rider_assignments_total = IntCounterVec::new(
            Opts::new(
                "rider_assignments_total",
                "Rider assignments by outcome (same_day, next_day)",
            ),
            &["outcome"],
        )
        .expect("valid rider_assignments_total metric");

        let pending_approvals = IntGauge::new(
            "pending_approvals",
            "Parcel requests waiting for main admin approval",
        )
        .expect("valid pending_approvals metric");

        registry
            .register(Box::new(parcels_created_total.clone()))
            .expect("register parcels_created_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register parcel_status_updates_total");
        registry
            .register(Box::new(rider_assignments_total.clone()))
            .expect("register rider_assignments_total");
        registry
            .register(Box::new(pending_approvals.clone()))
            .expect("register pending_approvals");

        Self {
            registry,
            parcels_created_total,
            status_updates_total,
            rider_assignments_total,
            pending_approvals,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
