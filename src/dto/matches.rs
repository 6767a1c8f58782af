use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        legs::LegSummary,
        validation::{validate_player_name, validate_player_names},
    },
    scoring::{FinishRule, StartingScore},
};

/// Upper bound on legs-to-win accepted when creating a match.
pub const MAX_LEGS_TO_WIN: u32 = 21;
/// Upper bound on players seated in one match.
pub const MAX_PLAYERS: u64 = 16;

/// Payload used to start a new match.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    /// 201, 301, 501 or 701.
    #[schema(value_type = u32, example = 501)]
    pub starting_score: StartingScore,
    pub finish_rule: FinishRule,
    #[validate(range(min = 1, max = MAX_LEGS_TO_WIN))]
    pub legs_to_win: u32,
    /// Player names in play order; unknown names are registered on the fly.
    #[validate(
        length(min = 1, max = MAX_PLAYERS),
        custom(function = "validate_player_names")
    )]
    pub players: Vec<String>,
}

/// New play order for every seated player.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ReorderPlayersRequest {
    #[validate(length(min = 1))]
    pub player_ids: Vec<Uuid>,
}

/// Player joining a match at the end of the rotation.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct AddPlayerRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// A seat in the match rotation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeatSummary {
    pub player_id: Uuid,
    pub name: String,
    pub play_order: u32,
}

/// Legs won by one player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LegsWon {
    pub player_id: Uuid,
    pub legs: u32,
}

/// Full description of a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    pub id: Uuid,
    #[schema(value_type = u32, example = 501)]
    pub starting_score: StartingScore,
    pub finish_rule: FinishRule,
    pub legs_to_win: u32,
    pub winner_player_id: Option<Uuid>,
    pub ended_early: bool,
    /// RFC 3339 completion time.
    pub completed_at: Option<String>,
    pub created_at: String,
    pub active: bool,
    pub players: Vec<SeatSummary>,
    pub legs: Vec<LegSummary>,
    pub legs_won: Vec<LegsWon>,
    /// Leg currently in play, if the match is active.
    pub current_leg_id: Option<Uuid>,
}

/// Row of the match listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchListItem {
    pub id: Uuid,
    #[schema(value_type = u32, example = 501)]
    pub starting_score: StartingScore,
    pub finish_rule: FinishRule,
    pub legs_to_win: u32,
    pub active: bool,
    pub winner_player_id: Option<Uuid>,
    pub created_at: String,
}

impl From<&crate::dao::models::MatchEntity> for MatchListItem {
    fn from(value: &crate::dao::models::MatchEntity) -> Self {
        Self {
            id: value.id,
            starting_score: value.starting_score,
            finish_rule: value.finish_rule,
            legs_to_win: value.legs_to_win,
            active: value.is_active(),
            winner_player_id: value.winner_player_id,
            created_at: format_system_time(value.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(players: &[&str], legs_to_win: u32) -> CreateMatchRequest {
        CreateMatchRequest {
            starting_score: StartingScore::S501,
            finish_rule: FinishRule::DoubleOut,
            legs_to_win,
            players: players.iter().map(|name| name.to_string()).collect(),
        }
    }

    #[test]
    fn create_request_accepts_a_regular_roster() {
        assert!(request(&["Ann", "Bo"], 3).validate().is_ok());
    }

    #[test]
    fn create_request_rejects_bad_rosters_and_thresholds() {
        assert!(request(&[], 1).validate().is_err());
        assert!(request(&["Ann", "Ann"], 1).validate().is_err());
        assert!(request(&["Ann"], 0).validate().is_err());
        assert!(request(&["Ann"], MAX_LEGS_TO_WIN + 1).validate().is_err());
    }

    #[test]
    fn starting_score_is_parsed_from_a_number() {
        let parsed: CreateMatchRequest = serde_json::from_str(
            r#"{"starting_score": 301, "finish_rule": "single_out", "legs_to_win": 1, "players": ["Ann"]}"#,
        )
        .expect("valid payload");
        assert_eq!(parsed.starting_score, StartingScore::S301);

        let rejected = serde_json::from_str::<CreateMatchRequest>(
            r#"{"starting_score": 400, "finish_rule": "single_out", "legs_to_win": 1, "players": ["Ann"]}"#,
        );
        assert!(rejected.is_err());
    }
}
