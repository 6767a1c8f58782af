use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{
        LegEntity, MatchEntity, MatchPlayerEntity, PlayerEntity, ThrowEntity, TurnEntity,
    },
    scoring::{FinishRule, Segment, StartingScore},
};

pub const MATCH_COLLECTION: &str = "matches";
pub const PLAYER_COLLECTION: &str = "players";
pub const MATCH_PLAYER_COLLECTION: &str = "match_players";
pub const LEG_COLLECTION: &str = "legs";
pub const TURN_COLLECTION: &str = "turns";
pub const THROW_COLLECTION: &str = "throws";

/// Filter selecting a document by primary key.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

fn parse_id(collection: &'static str, field: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| MongoDaoError::InvalidDocument {
        collection,
        field,
        value: value.to_owned(),
    })
}

fn parse_optional_id(
    collection: &'static str,
    field: &'static str,
    value: Option<&str>,
) -> MongoResult<Option<Uuid>> {
    value
        .map(|value| parse_id(collection, field, value))
        .transpose()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    starting_score: StartingScore,
    finish_rule: FinishRule,
    legs_to_win: u32,
    winner_player_id: Option<String>,
    completed_at: Option<DateTime>,
    #[serde(default)]
    ended_early: bool,
    created_at: DateTime,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id.to_string(),
            starting_score: value.starting_score,
            finish_rule: value.finish_rule,
            legs_to_win: value.legs_to_win,
            winner_player_id: value.winner_player_id.map(|id| id.to_string()),
            completed_at: value.completed_at.map(DateTime::from_system_time),
            ended_early: value.ended_early,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(MATCH_COLLECTION, "_id", &value.id)?,
            starting_score: value.starting_score,
            finish_rule: value.finish_rule,
            legs_to_win: value.legs_to_win,
            winner_player_id: parse_optional_id(
                MATCH_COLLECTION,
                "winner_player_id",
                value.winner_player_id.as_deref(),
            )?,
            completed_at: value.completed_at.map(DateTime::to_system_time),
            ended_early: value.ended_early,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    created_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PLAYER_COLLECTION, "_id", &value.id)?,
            name: value.name,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// The whole rotation of a match lives in one document keyed by the match id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchPlayersDocument {
    #[serde(rename = "_id")]
    match_id: String,
    seats: Vec<MongoSeat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoSeat {
    player_id: String,
    play_order: u32,
}

impl MongoMatchPlayersDocument {
    pub fn new(match_id: Uuid, players: Vec<MatchPlayerEntity>) -> Self {
        Self {
            match_id: match_id.to_string(),
            seats: players
                .into_iter()
                .map(|seat| MongoSeat {
                    player_id: seat.player_id.to_string(),
                    play_order: seat.play_order,
                })
                .collect(),
        }
    }

    pub fn into_entities(self) -> MongoResult<Vec<MatchPlayerEntity>> {
        let match_id = parse_id(MATCH_PLAYER_COLLECTION, "_id", &self.match_id)?;
        self.seats
            .into_iter()
            .map(|seat| {
                Ok(MatchPlayerEntity {
                    match_id,
                    player_id: parse_id(MATCH_PLAYER_COLLECTION, "player_id", &seat.player_id)?,
                    play_order: seat.play_order,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLegDocument {
    #[serde(rename = "_id")]
    id: String,
    match_id: String,
    leg_number: u32,
    starting_player_id: String,
    winner_player_id: Option<String>,
    created_at: DateTime,
}

impl From<LegEntity> for MongoLegDocument {
    fn from(value: LegEntity) -> Self {
        Self {
            id: value.id.to_string(),
            match_id: value.match_id.to_string(),
            leg_number: value.leg_number,
            starting_player_id: value.starting_player_id.to_string(),
            winner_player_id: value.winner_player_id.map(|id| id.to_string()),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoLegDocument> for LegEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoLegDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(LEG_COLLECTION, "_id", &value.id)?,
            match_id: parse_id(LEG_COLLECTION, "match_id", &value.match_id)?,
            leg_number: value.leg_number,
            starting_player_id: parse_id(
                LEG_COLLECTION,
                "starting_player_id",
                &value.starting_player_id,
            )?,
            winner_player_id: parse_optional_id(
                LEG_COLLECTION,
                "winner_player_id",
                value.winner_player_id.as_deref(),
            )?,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTurnDocument {
    #[serde(rename = "_id")]
    id: String,
    leg_id: String,
    player_id: String,
    turn_number: u32,
    total_scored: u32,
    busted: bool,
    #[serde(default)]
    is_tiebreak: bool,
    created_at: DateTime,
}

impl From<TurnEntity> for MongoTurnDocument {
    fn from(value: TurnEntity) -> Self {
        Self {
            id: value.id.to_string(),
            leg_id: value.leg_id.to_string(),
            player_id: value.player_id.to_string(),
            turn_number: value.turn_number,
            total_scored: value.total_scored,
            busted: value.busted,
            is_tiebreak: value.is_tiebreak,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoTurnDocument> for TurnEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoTurnDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(TURN_COLLECTION, "_id", &value.id)?,
            leg_id: parse_id(TURN_COLLECTION, "leg_id", &value.leg_id)?,
            player_id: parse_id(TURN_COLLECTION, "player_id", &value.player_id)?,
            turn_number: value.turn_number,
            total_scored: value.total_scored,
            busted: value.busted,
            is_tiebreak: value.is_tiebreak,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThrowDocument {
    #[serde(rename = "_id")]
    id: String,
    turn_id: String,
    dart_index: u8,
    segment: String,
    scored: u32,
    created_at: DateTime,
}

impl From<ThrowEntity> for MongoThrowDocument {
    fn from(value: ThrowEntity) -> Self {
        Self {
            id: value.id.to_string(),
            turn_id: value.turn_id.to_string(),
            dart_index: value.dart_index,
            segment: value.segment.label(),
            scored: value.scored,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoThrowDocument> for ThrowEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoThrowDocument) -> MongoResult<Self> {
        let segment: Segment =
            value
                .segment
                .parse()
                .map_err(|_| MongoDaoError::InvalidDocument {
                    collection: THROW_COLLECTION,
                    field: "segment",
                    value: value.segment.clone(),
                })?;
        Ok(Self {
            id: parse_id(THROW_COLLECTION, "_id", &value.id)?,
            turn_id: parse_id(THROW_COLLECTION, "turn_id", &value.turn_id)?,
            dart_index: value.dart_index,
            segment,
            scored: value.scored,
            created_at: value.created_at.to_system_time(),
        })
    }
}
