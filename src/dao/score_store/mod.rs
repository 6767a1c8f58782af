/// In-process backend used by tests and when no database is configured.
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    LegEntity, MatchEntity, MatchPlayerEntity, PlayerEntity, ThrowEntity, TurnEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Unique player display names.
pub const PLAYER_NAME_KEY: &str = "players_name_key";
/// Unique leg numbers within a match.
pub const LEG_NUMBER_KEY: &str = "legs_match_id_leg_number_key";
/// Unique turn numbers within a leg; arbitrates concurrent turn creation.
pub const TURN_NUMBER_KEY: &str = "turns_leg_id_turn_number_key";
/// Unique dart positions within a turn.
pub const DART_INDEX_KEY: &str = "throws_turn_id_dart_index_key";
/// Unique throw identifiers, used for idempotent submissions.
pub const THROW_ID_KEY: &str = "throws_pkey";

/// Row-level persistence for matches, legs, turns and throws.
///
/// No multi-row transactions are assumed; uniqueness collisions are reported
/// as [`StorageError::UniqueViolation`](crate::dao::storage::StorageError::UniqueViolation).
pub trait ScoreStore: Send + Sync {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn find_player_by_name(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;

    /// Seats of a match ordered by play order.
    fn list_match_players(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchPlayerEntity>>>;
    fn replace_match_players(
        &self,
        match_id: Uuid,
        players: Vec<MatchPlayerEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn update_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_leg(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LegEntity>>>;
    /// Legs of a match ordered by leg number.
    fn list_legs(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<LegEntity>>>;

    fn insert_turn(&self, turn: TurnEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_turn(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>>;
    /// Turn with the highest turn number in the leg.
    fn latest_turn(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>>;
    /// Turns of a leg ordered by turn number.
    fn list_turns(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TurnEntity>>>;
    fn update_turn_score(
        &self,
        turn_id: Uuid,
        total_scored: u32,
        busted: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThrowEntity>>>;
    /// Throws belonging to any of `turn_ids`, ordered by dart index.
    fn list_throws(
        &self,
        turn_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<ThrowEntity>>>;
    fn update_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a throw, returning whether it existed.
    fn delete_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
