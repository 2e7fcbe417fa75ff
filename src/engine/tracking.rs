use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;

pub const TRACKING_PREFIX: &str = "NV-";

/// Builds `NV-<millis><sequence><suffix>` identifiers.
///
/// Millis and suffix are fixed width, so distinct sequence numbers always
/// yield distinct ids within one process. The store still reserves each id
/// with an insert-if-absent before use.
#[derive(Debug, Default)]
pub struct TrackingIdGenerator {
    sequence: AtomicU64,
}

impl TrackingIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = Utc::now().timestamp_millis();
        let suffix: u16 = rand::thread_rng().gen_range(0..1000);

        format!("{TRACKING_PREFIX}{millis:013}{sequence:06}{suffix:03}")
    }
}
