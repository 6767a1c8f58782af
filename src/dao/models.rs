use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::scoring::{
    FinishRule, Segment, StartingScore,
    realtime::{ThrowRow, TurnRow},
};

/// A contest between players, won by the first to reach `legs_to_win` legs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Score every leg starts from.
    pub starting_score: StartingScore,
    /// Rule deciding which darts may finish a leg.
    pub finish_rule: FinishRule,
    /// Legs a player must win to take the match.
    pub legs_to_win: u32,
    /// Winner, once decided.
    pub winner_player_id: Option<Uuid>,
    /// When the match finished (won or ended early).
    pub completed_at: Option<SystemTime>,
    /// Whether the match was stopped before anyone reached `legs_to_win`.
    pub ended_early: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl MatchEntity {
    /// A match is active until a winner, a completion time or an early end is recorded.
    pub fn is_active(&self) -> bool {
        self.winner_player_id.is_none() && self.completed_at.is_none() && !self.ended_early
    }
}

/// A registered player, identified by a unique display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Unique display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Seat of a player in a match's turn rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchPlayerEntity {
    /// Match the seat belongs to.
    pub match_id: Uuid,
    /// Player occupying the seat.
    pub player_id: Uuid,
    /// Zero-based position in the rotation.
    pub play_order: u32,
}

/// One game within a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegEntity {
    /// Primary key of the leg.
    pub id: Uuid,
    /// Owning match.
    pub match_id: Uuid,
    /// One-based sequence number within the match.
    pub leg_number: u32,
    /// Player throwing first in this leg.
    pub starting_player_id: Uuid,
    /// Winner, set when the leg is checked out.
    pub winner_player_id: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Up to three darts thrown by one player within a leg.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnEntity {
    /// Primary key of the turn.
    pub id: Uuid,
    /// Owning leg.
    pub leg_id: Uuid,
    /// Player throwing the turn.
    pub player_id: Uuid,
    /// Position of the turn within the leg, unique per leg.
    pub turn_number: u32,
    /// Cached points credited for the turn (0 when busted).
    pub total_scored: u32,
    /// Whether the turn busted.
    pub busted: bool,
    /// Tiebreak rounds are scored independently of the X01 ladder.
    #[serde(default)]
    pub is_tiebreak: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// A single dart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThrowEntity {
    /// Primary key of the throw.
    pub id: Uuid,
    /// Owning turn.
    pub turn_id: Uuid,
    /// One-based position of the dart within the turn.
    pub dart_index: u8,
    /// Segment the dart landed in.
    pub segment: Segment,
    /// Points of the segment, denormalised for readers.
    pub scored: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl ThrowEntity {
    /// Build a throw for `segment` at `dart_index` of `turn_id`.
    pub fn new(id: Uuid, turn_id: Uuid, dart_index: u8, segment: Segment) -> Self {
        Self {
            id,
            turn_id,
            dart_index,
            segment,
            scored: segment.scored(),
            created_at: SystemTime::now(),
        }
    }

    /// Change-feed row for this dart, tagged with the leg its turn belongs to.
    pub fn change_row(&self, leg_id: Uuid) -> ThrowRow {
        ThrowRow {
            id: self.id,
            turn_id: self.turn_id,
            leg_id: Some(leg_id),
            dart_index: self.dart_index,
            segment: self.segment.label(),
            scored: Some(self.scored),
        }
    }
}

impl From<&TurnEntity> for TurnRow {
    fn from(value: &TurnEntity) -> Self {
        Self {
            id: value.id,
            leg_id: value.leg_id,
            player_id: value.player_id,
            turn_number: value.turn_number,
            total_scored: value.total_scored,
            busted: value.busted,
        }
    }
}
