//! Store request metrics.

use std::time::Duration;

use metrics::{counter, histogram};

pub mod names {
    /// Requests by operation, table and final status
    pub const REQUESTS_TOTAL: &str = "framelab_db_requests_total";
    pub const RETRIES_TOTAL: &str = "framelab_db_retries_total";
    /// Wall time including retries
    pub const REQUEST_SECONDS: &str = "framelab_db_request_seconds";
}

pub fn record_request(operation: &str, table: &str, status: u16, elapsed: Duration) {
    let labels = [
        ("operation", operation.to_string()),
        ("table", table.to_string()),
        ("status", status.to_string()),
    ];
    counter!(names::REQUESTS_TOTAL, &labels).increment(1);
    histogram!(
        names::REQUEST_SECONDS,
        "operation" => operation.to_string(),
        "table" => table.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}
