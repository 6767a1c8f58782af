use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{LegEntity, TurnEntity},
    dto::throws::ThrowSummary,
};

/// Leg as listed on its match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LegSummary {
    pub id: Uuid,
    pub leg_number: u32,
    pub starting_player_id: Uuid,
    pub winner_player_id: Option<Uuid>,
}

impl From<&LegEntity> for LegSummary {
    fn from(value: &LegEntity) -> Self {
        Self {
            id: value.id,
            leg_number: value.leg_number,
            starting_player_id: value.starting_player_id,
            winner_player_id: value.winner_player_id,
        }
    }
}

/// A turn with its darts ordered by index.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TurnSummary {
    pub id: Uuid,
    pub player_id: Uuid,
    pub turn_number: u32,
    pub total_scored: u32,
    pub busted: bool,
    pub is_tiebreak: bool,
    pub throws: Vec<ThrowSummary>,
}

impl TurnSummary {
    /// Pair a turn with its (already ordered) darts.
    pub fn new(turn: &TurnEntity, throws: Vec<ThrowSummary>) -> Self {
        Self {
            id: turn.id,
            player_id: turn.player_id,
            turn_number: turn.turn_number,
            total_scored: turn.total_scored,
            busted: turn.busted,
            is_tiebreak: turn.is_tiebreak,
            throws,
        }
    }
}

/// Remaining score of one player in a leg.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerRemaining {
    pub player_id: Uuid,
    pub remaining: u32,
}

/// Everything a scoreboard needs to render a leg.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LegView {
    pub id: Uuid,
    pub match_id: Uuid,
    pub leg_number: u32,
    pub starting_player_id: Uuid,
    pub winner_player_id: Option<Uuid>,
    /// Player expected to throw next; absent once the leg is won.
    pub current_player_id: Option<Uuid>,
    /// Darts the current player has left in their turn.
    pub darts_left: u32,
    /// Remaining score per player in play order.
    pub remaining: Vec<PlayerRemaining>,
    pub turns: Vec<TurnSummary>,
    /// Suggested finishing routes for the current player, as segment labels.
    pub checkout: Vec<Vec<String>>,
}

/// Outcome of replaying a leg and rewriting its cached turn totals.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecomputeResponse {
    pub leg_id: Uuid,
    /// Turns replayed (tiebreak turns are skipped).
    pub turns_examined: usize,
    /// Turns whose stored total or bust flag changed.
    pub turns_updated: usize,
    /// First player whose darts check the leg out, if any.
    pub finished_by: Option<Uuid>,
}
