/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier of a batch run (UUIDv7, so ids sort by creation time).
pub type BatchId = uuid::Uuid;

/// Endpoint identifier that designates the host running this service.
pub const LOCAL_ENDPOINT: &str = "Actual";

/// Whether an endpoint identifier designates the local host.
///
/// The sentinel is compared case-insensitively.
pub fn is_local_endpoint(endpoint: &str) -> bool {
    endpoint.eq_ignore_ascii_case(LOCAL_ENDPOINT)
}
