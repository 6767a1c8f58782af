use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::scoring::realtime::{SpectatorState, TurnView};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`changes` or `leg`).
    pub stream: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Spectator view of a leg, sent on connect and after every folded change.
pub struct LegSnapshotEvent {
    pub leg_id: Uuid,
    #[schema(value_type = Vec<Object>)]
    pub turns: Vec<TurnView>,
}

impl LegSnapshotEvent {
    /// Snapshot of the spectator state for `leg_id`.
    pub fn from_state(leg_id: Uuid, state: &SpectatorState) -> Self {
        Self {
            leg_id,
            turns: state.turns.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once when a turn reaches three darts or its score is settled.
pub struct TurnCompletedEvent {
    pub leg_id: Uuid,
    pub turn_id: Uuid,
}
