use std::{hash::Hash, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{
    DART_INDEX_KEY, LEG_NUMBER_KEY, PLAYER_NAME_KEY, ScoreStore, THROW_ID_KEY, TURN_NUMBER_KEY,
};
use crate::dao::{
    models::{LegEntity, MatchEntity, MatchPlayerEntity, PlayerEntity, ThrowEntity, TurnEntity},
    storage::{StorageError, StorageResult},
};

/// Score store keeping every table in memory.
///
/// Unique indices are claimed through the `DashMap` entry API before the row
/// is written, so two racing inserts for the same key cannot both succeed.
#[derive(Clone, Default)]
pub struct MemoryScoreStore {
    inner: Arc<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    matches: DashMap<Uuid, MatchEntity>,
    players: DashMap<Uuid, PlayerEntity>,
    player_names: DashMap<String, Uuid>,
    match_players: DashMap<Uuid, Vec<MatchPlayerEntity>>,
    legs: DashMap<Uuid, LegEntity>,
    leg_numbers: DashMap<(Uuid, u32), Uuid>,
    turns: DashMap<Uuid, TurnEntity>,
    turn_numbers: DashMap<(Uuid, u32), Uuid>,
    throws: DashMap<Uuid, ThrowEntity>,
    dart_slots: DashMap<(Uuid, u8), Uuid>,
}

impl MemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reserve `key` in a unique index, failing when another row already owns it.
fn claim<K: Eq + Hash>(
    index: &DashMap<K, Uuid>,
    key: K,
    id: Uuid,
    constraint: &'static str,
) -> StorageResult<()> {
    match index.entry(key) {
        Entry::Occupied(_) => Err(StorageError::UniqueViolation { constraint }),
        Entry::Vacant(slot) => {
            slot.insert(id);
            Ok(())
        }
    }
}

impl MemoryTables {
    fn insert_player(&self, player: PlayerEntity) -> StorageResult<()> {
        claim(
            &self.player_names,
            player.name.clone(),
            player.id,
            PLAYER_NAME_KEY,
        )?;
        self.players.insert(player.id, player);
        Ok(())
    }

    fn find_player_by_name(&self, name: &str) -> Option<PlayerEntity> {
        let id = *self.player_names.get(name)?;
        self.players.get(&id).map(|entry| entry.clone())
    }

    fn insert_leg(&self, leg: LegEntity) -> StorageResult<()> {
        claim(
            &self.leg_numbers,
            (leg.match_id, leg.leg_number),
            leg.id,
            LEG_NUMBER_KEY,
        )?;
        self.legs.insert(leg.id, leg);
        Ok(())
    }

    fn list_legs(&self, match_id: Uuid) -> Vec<LegEntity> {
        let mut legs: Vec<LegEntity> = self
            .legs
            .iter()
            .filter(|entry| entry.match_id == match_id)
            .map(|entry| entry.clone())
            .collect();
        legs.sort_by_key(|leg| leg.leg_number);
        legs
    }

    fn insert_turn(&self, turn: TurnEntity) -> StorageResult<()> {
        claim(
            &self.turn_numbers,
            (turn.leg_id, turn.turn_number),
            turn.id,
            TURN_NUMBER_KEY,
        )?;
        self.turns.insert(turn.id, turn);
        Ok(())
    }

    fn list_turns(&self, leg_id: Uuid) -> Vec<TurnEntity> {
        let mut turns: Vec<TurnEntity> = self
            .turns
            .iter()
            .filter(|entry| entry.leg_id == leg_id)
            .map(|entry| entry.clone())
            .collect();
        turns.sort_by_key(|turn| turn.turn_number);
        turns
    }

    fn latest_turn(&self, leg_id: Uuid) -> Option<TurnEntity> {
        self.turns
            .iter()
            .filter(|entry| entry.leg_id == leg_id)
            .max_by_key(|entry| entry.turn_number)
            .map(|entry| entry.clone())
    }

    fn update_turn_score(&self, turn_id: Uuid, total_scored: u32, busted: bool) {
        if let Some(mut turn) = self.turns.get_mut(&turn_id) {
            turn.total_scored = total_scored;
            turn.busted = busted;
        }
    }

    fn insert_throw(&self, throw: ThrowEntity) -> StorageResult<()> {
        // The id stays locked until the dart slot is claimed as well.
        match self.throws.entry(throw.id) {
            Entry::Occupied(_) => Err(StorageError::UniqueViolation {
                constraint: THROW_ID_KEY,
            }),
            Entry::Vacant(row) => {
                claim(
                    &self.dart_slots,
                    (throw.turn_id, throw.dart_index),
                    throw.id,
                    DART_INDEX_KEY,
                )?;
                row.insert(throw);
                Ok(())
            }
        }
    }

    fn list_throws(&self, turn_ids: &[Uuid]) -> Vec<ThrowEntity> {
        let mut throws: Vec<ThrowEntity> = self
            .throws
            .iter()
            .filter(|entry| turn_ids.contains(&entry.turn_id))
            .map(|entry| entry.clone())
            .collect();
        throws.sort_by_key(|throw| throw.dart_index);
        throws
    }

    fn update_throw(&self, throw: ThrowEntity) -> StorageResult<()> {
        let Some(previous) = self.throws.get(&throw.id).map(|entry| entry.clone()) else {
            return Ok(());
        };
        let previous_slot = (previous.turn_id, previous.dart_index);
        let next_slot = (throw.turn_id, throw.dart_index);
        if previous_slot != next_slot {
            claim(&self.dart_slots, next_slot, throw.id, DART_INDEX_KEY)?;
            self.dart_slots.remove(&previous_slot);
        }
        self.throws.insert(throw.id, throw);
        Ok(())
    }

    fn delete_throw(&self, id: Uuid) -> bool {
        match self.throws.remove(&id) {
            Some((_, throw)) => {
                self.dart_slots.remove(&(throw.turn_id, throw.dart_index));
                true
            }
            None => false,
        }
    }
}

impl ScoreStore for MemoryScoreStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.matches.insert(entity.id, entity);
            Ok(())
        })
    }

    fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut slot) = store.inner.matches.get_mut(&entity.id) {
                *slot = entity;
            }
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.matches.get(&id).map(|entry| entry.clone())) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut matches: Vec<MatchEntity> = store
                .inner
                .matches
                .iter()
                .map(|entry| entry.clone())
                .collect();
            matches.sort_by_key(|entity| entity.created_at);
            Ok(matches)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_player(player) })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.players.get(&id).map(|entry| entry.clone())) })
    }

    fn find_player_by_name(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.find_player_by_name(&name)) })
    }

    fn list_match_players(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchPlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut seats = store
                .inner
                .match_players
                .get(&match_id)
                .map(|entry| entry.clone())
                .unwrap_or_default();
            seats.sort_by_key(|seat| seat.play_order);
            Ok(seats)
        })
    }

    fn replace_match_players(
        &self,
        match_id: Uuid,
        players: Vec<MatchPlayerEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.match_players.insert(match_id, players);
            Ok(())
        })
    }

    fn insert_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_leg(leg) })
    }

    fn update_leg(&self, leg: LegEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut slot) = store.inner.legs.get_mut(&leg.id) {
                *slot = leg;
            }
            Ok(())
        })
    }

    fn find_leg(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<LegEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.legs.get(&id).map(|entry| entry.clone())) })
    }

    fn list_legs(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<LegEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_legs(match_id)) })
    }

    fn insert_turn(&self, turn: TurnEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_turn(turn) })
    }

    fn find_turn(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.turns.get(&id).map(|entry| entry.clone())) })
    }

    fn latest_turn(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Option<TurnEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.latest_turn(leg_id)) })
    }

    fn list_turns(&self, leg_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TurnEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_turns(leg_id)) })
    }

    fn update_turn_score(
        &self,
        turn_id: Uuid,
        total_scored: u32,
        busted: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.update_turn_score(turn_id, total_scored, busted);
            Ok(())
        })
    }

    fn insert_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_throw(throw) })
    }

    fn find_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThrowEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.throws.get(&id).map(|entry| entry.clone())) })
    }

    fn list_throws(
        &self,
        turn_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<ThrowEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_throws(&turn_ids)) })
    }

    fn update_throw(&self, throw: ThrowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.update_throw(throw) })
    }

    fn delete_throw(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.delete_throw(id)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::scoring::Segment;

    fn turn(leg_id: Uuid, turn_number: u32) -> TurnEntity {
        TurnEntity {
            id: Uuid::new_v4(),
            leg_id,
            player_id: Uuid::new_v4(),
            turn_number,
            total_scored: 0,
            busted: false,
            is_tiebreak: false,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn turn_numbers_are_unique_per_leg() {
        let store = MemoryScoreStore::new();
        let leg_id = Uuid::new_v4();
        store.insert_turn(turn(leg_id, 1)).await.unwrap();

        let err = store.insert_turn(turn(leg_id, 1)).await.unwrap_err();
        assert!(err.is_unique_violation());

        // Same number in another leg is fine.
        store.insert_turn(turn(Uuid::new_v4(), 1)).await.unwrap();
    }

    #[tokio::test]
    async fn latest_turn_and_listing_follow_turn_number() {
        let store = MemoryScoreStore::new();
        let leg_id = Uuid::new_v4();
        for number in [2, 3, 1] {
            store.insert_turn(turn(leg_id, number)).await.unwrap();
        }

        let latest = store.latest_turn(leg_id).await.unwrap().unwrap();
        assert_eq!(latest.turn_number, 3);
        let numbers: Vec<u32> = store
            .list_turns(leg_id)
            .await
            .unwrap()
            .into_iter()
            .map(|turn| turn.turn_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn dart_slot_is_released_on_delete() {
        let store = MemoryScoreStore::new();
        let turn_id = Uuid::new_v4();
        let first = ThrowEntity::new(Uuid::new_v4(), turn_id, 1, Segment::Triple(20));
        store.insert_throw(first.clone()).await.unwrap();

        let clash = ThrowEntity::new(Uuid::new_v4(), turn_id, 1, Segment::Single(1));
        assert!(store.insert_throw(clash.clone()).await.unwrap_err().is_unique_violation());

        assert!(store.delete_throw(first.id).await.unwrap());
        store.insert_throw(clash).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_inserts_of_one_throw_id_store_it_once() {
        let store = MemoryScoreStore::new();
        let throw_id = Uuid::new_v4();
        let turn_ids: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();

        let attempts: Vec<_> = turn_ids
            .iter()
            .map(|turn_id| {
                let store = store.clone();
                let throw = ThrowEntity::new(throw_id, *turn_id, 1, Segment::Single(5));
                tokio::spawn(async move { store.insert_throw(throw).await })
            })
            .collect();
        let mut stored = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => stored += 1,
                Err(err) => assert!(err.is_unique_violation()),
            }
        }
        assert_eq!(stored, 1);

        let kept = store.list_throws(turn_ids.clone()).await.unwrap();
        assert_eq!(kept.len(), 1);
        // Losing inserts leave their dart slots free.
        for turn_id in turn_ids.iter().filter(|turn_id| **turn_id != kept[0].turn_id) {
            let fresh = ThrowEntity::new(Uuid::new_v4(), *turn_id, 1, Segment::Miss);
            store.insert_throw(fresh).await.unwrap();
        }
    }

    #[tokio::test]
    async fn player_names_are_unique() {
        let store = MemoryScoreStore::new();
        let player = |name: &str| PlayerEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: SystemTime::now(),
        };
        store.insert_player(player("Phil")).await.unwrap();
        assert!(
            store
                .insert_player(player("Phil"))
                .await
                .unwrap_err()
                .is_unique_violation()
        );
        assert!(store.find_player_by_name("Phil".into()).await.unwrap().is_some());
    }
}
