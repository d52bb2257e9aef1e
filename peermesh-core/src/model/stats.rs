use serde::{Deserialize, Serialize};

/// Snapshot of a peer connection's transport counters, read on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_lost: i64,
    /// Seconds; `None` until a candidate pair has been nominated.
    pub round_trip_time: Option<f64>,
}
