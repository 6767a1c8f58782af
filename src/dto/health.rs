use serde::Serialize;
use utoipa::ToSchema;

/// Whether the backend can currently reach its score store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// SSE streams currently subscribed to row changes.
    pub change_subscribers: usize,
}

impl HealthResponse {
    /// Build a response from the degraded flag.
    pub fn new(degraded: bool, change_subscribers: usize) -> Self {
        let status = if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };
        Self {
            status,
            change_subscribers,
        }
    }
}
