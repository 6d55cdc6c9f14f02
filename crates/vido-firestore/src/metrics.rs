//! Firestore client metrics.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const REQUESTS: &str = "vido_firestore_requests_total";
    pub const RETRIES: &str = "vido_firestore_retries_total";
}

/// Record one REST request with its outcome.
pub fn record_request(operation: &'static str, status: u16) {
    counter!(
        names::REQUESTS,
        "operation" => operation,
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record one retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES, "operation" => operation.to_string()).increment(1);
}
