use std::{sync::Arc, time::SystemTime};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{models::TurnEntity, score_store::ScoreStore},
    error::ServiceError,
    scoring::{realtime::TurnRow, x01::DARTS_PER_TURN},
    services::change_feed,
    state::{RowChangeEvent, SharedState},
};

/// Insert attempts before a lost turn-number race is reported as a conflict.
const MAX_TURN_ATTEMPTS: u32 = 2;

/// Return the open turn of `player_id` in `leg_id`, or start the next one.
///
/// Calling this twice before a dart is recorded yields the same turn. Concurrent
/// callers racing for the same next turn number are arbitrated by the storage
/// uniqueness constraint on `(leg_id, turn_number)`; the loser re-reads and either
/// continues the winner's turn or retries with a fresh number.
pub async fn resolve_or_create_turn_for_player(
    state: &SharedState,
    leg_id: Uuid,
    player_id: Uuid,
) -> Result<TurnEntity, ServiceError> {
    let store = state.require_score_store().await?;

    for attempt in 1..=MAX_TURN_ATTEMPTS {
        let latest = store.latest_turn(leg_id).await?;

        if let Some(turn) = latest.as_ref() {
            if is_open_turn_of(&store, turn, player_id).await? {
                debug!(turn_id = %turn.id, attempt, "continuing open turn");
                return Ok(turn.clone());
            }
        }

        let turn = TurnEntity {
            id: Uuid::new_v4(),
            leg_id,
            player_id,
            turn_number: latest.map_or(1, |turn| turn.turn_number + 1),
            total_scored: 0,
            busted: false,
            is_tiebreak: false,
            created_at: SystemTime::now(),
        };

        match store.insert_turn(turn.clone()).await {
            Ok(()) => {
                debug!(turn_id = %turn.id, turn_number = turn.turn_number, "started turn");
                change_feed::publish(
                    state,
                    RowChangeEvent::Turns(change_feed::inserted(TurnRow::from(&turn))),
                );
                return Ok(turn);
            }
            Err(err) if err.is_unique_violation() => {
                warn!(
                    %leg_id,
                    turn_number = turn.turn_number,
                    attempt,
                    "turn number taken by a concurrent writer; re-reading"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::Conflict(format!(
        "could not start a turn in leg `{leg_id}` after {MAX_TURN_ATTEMPTS} attempts"
    )))
}

/// Whether `turn` belongs to `player_id`, has not busted and still has darts left.
async fn is_open_turn_of(
    store: &Arc<dyn ScoreStore>,
    turn: &TurnEntity,
    player_id: Uuid,
) -> Result<bool, ServiceError> {
    if turn.player_id != player_id || turn.busted {
        return Ok(false);
    }
    let recorded = store.list_throws(vec![turn.id]).await?.len();
    Ok(recorded < DARTS_PER_TURN)
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{
                LegEntity, MatchEntity, MatchPlayerEntity, PlayerEntity, ThrowEntity,
            },
            score_store::memory::MemoryScoreStore,
            storage::StorageResult,
        },
        scoring::Segment,
        state::AppState,
    };

    async fn state_with(store: Arc<dyn ScoreStore>) -> SharedState {
        AppState::with_store(AppConfig::default(), store).await
    }

    #[tokio::test]
    async fn repeated_resolution_returns_the_same_turn() {
        let state = state_with(Arc::new(MemoryScoreStore::new())).await;
        let leg_id = Uuid::new_v4();
        let player = Uuid::new_v4();

        let first = resolve_or_create_turn_for_player(&state, leg_id, player)
            .await
            .expect("turn created");
        let second = resolve_or_create_turn_for_player(&state, leg_id, player)
            .await
            .expect("turn resolved");

        assert_eq!(first.id, second.id);
        assert_eq!(first.turn_number, 1);
    }

    #[tokio::test]
    async fn full_turn_rolls_over_to_a_new_number() {
        let store = Arc::new(MemoryScoreStore::new());
        let state = state_with(store.clone()).await;
        let leg_id = Uuid::new_v4();
        let player = Uuid::new_v4();

        let first = resolve_or_create_turn_for_player(&state, leg_id, player)
            .await
            .expect("turn created");
        for dart_index in 1..=3 {
            store
                .insert_throw(ThrowEntity::new(
                    Uuid::new_v4(),
                    first.id,
                    dart_index,
                    Segment::Single(1),
                ))
                .await
                .expect("throw stored");
        }

        let next = resolve_or_create_turn_for_player(&state, leg_id, player)
            .await
            .expect("next turn");
        assert_ne!(next.id, first.id);
        assert_eq!(next.turn_number, 2);
    }

    #[tokio::test]
    async fn other_players_turn_is_never_continued() {
        let state = state_with(Arc::new(MemoryScoreStore::new())).await;
        let leg_id = Uuid::new_v4();

        let alice = resolve_or_create_turn_for_player(&state, leg_id, Uuid::new_v4())
            .await
            .expect("alice's turn");
        let bob = resolve_or_create_turn_for_player(&state, leg_id, Uuid::new_v4())
            .await
            .expect("bob's turn");

        assert_eq!(bob.turn_number, alice.turn_number + 1);
    }

    /// Store whose turn inserts always collide, as if another scorer always wins.
    #[derive(Clone, Default)]
    struct ContendedStore {
        inner: MemoryScoreStore,
    }

    impl ScoreStore for ContendedStore {
        fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_match(entity)
        }
        fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_match(entity)
        }
        fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            self.inner.find_match(id)
        }
        fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
            self.inner.list_matches()
        }
        fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_player(player)
        }
        fn find_player(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            self.inner.find_player(id)
        }
        fn find_player_by_name(
            &self,
            name: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            self.inner.find_player_by_name(name)
        }
        fn list_match_players(
            &self,
            match_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<MatchPlayerEntity>>> {
            self.inner.list_match_players(match_id)
        }
        fn replace_match_players(
            &self,
            match_id: Uuid,
            players: Vec<MatchPlayerEntity>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.replace_match_players(match_id, players)
        }
        fn insert_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_leg(leg)
        }
        fn update_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_leg(leg)
        }
        fn find_leg(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LegEntity>>> {
            self.inner.find_leg(id)
        }
        fn list_legs(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<LegEntity>>> {
            self.inner.list_legs(match_id)
        }
        fn insert_turn(&self, _turn: TurnEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async {
                Err(crate::dao::storage::StorageError::UniqueViolation {
                    constraint: crate::dao::score_store::TURN_NUMBER_KEY,
                })
            })
        }
        fn find_turn(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>> {
            self.inner.find_turn(id)
        }
        fn latest_turn(
            &self,
            leg_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>> {
            self.inner.latest_turn(leg_id)
        }
        fn list_turns(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TurnEntity>>> {
            self.inner.list_turns(leg_id)
        }
        fn update_turn_score(
            &self,
            turn_id: Uuid,
            total_scored: u32,
            busted: bool,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_turn_score(turn_id, total_scored, busted)
        }
        fn insert_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_throw(throw)
        }
        fn find_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThrowEntity>>> {
            self.inner.find_throw(id)
        }
        fn list_throws(
            &self,
            turn_ids: Vec<Uuid>,
        ) -> BoxFuture<'static, StorageResult<Vec<ThrowEntity>>> {
            self.inner.list_throws(turn_ids)
        }
        fn update_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_throw(throw)
        }
        fn delete_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_throw(id)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_a_conflict() {
        let state = state_with(Arc::new(ContendedStore::default())).await;

        let err = resolve_or_create_turn_for_player(&state, Uuid::new_v4(), Uuid::new_v4())
            .await
            .expect_err("every insert collides");
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn losing_a_race_continues_the_winners_turn() {
        let store = Arc::new(MemoryScoreStore::new());
        let state = state_with(store.clone()).await;
        let leg_id = Uuid::new_v4();
        let player = Uuid::new_v4();

        let (left, right) = tokio::join!(
            resolve_or_create_turn_for_player(&state, leg_id, player),
            resolve_or_create_turn_for_player(&state, leg_id, player),
        );

        let left = left.expect("left resolved");
        let right = right.expect("right resolved");
        assert_eq!(left.id, right.id);
        assert_eq!(store.list_turns(leg_id).await.expect("turns").len(), 1);
    }
}
