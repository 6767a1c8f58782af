use std::{sync::Arc, time::SystemTime};

use indexmap::IndexMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{LegEntity, MatchEntity, MatchPlayerEntity, PlayerEntity},
        score_store::ScoreStore,
    },
    dto::{
        format_system_time,
        legs::LegSummary,
        matches::{
            AddPlayerRequest, CreateMatchRequest, LegsWon, MatchListItem, MatchSummary,
            ReorderPlayersRequest, SeatSummary,
        },
    },
    error::ServiceError,
    services::change_feed,
    state::{LegRow, MatchRow, RowChangeEvent, SharedState},
};

/// What finishing a leg led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegCompletion {
    /// Whether the match is over (won, or already ended).
    pub match_completed: bool,
    /// Leg that follows the completed one, when the match goes on.
    pub next_leg_id: Option<Uuid>,
}

/// Start a new match, registering unknown players and opening its first leg.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let CreateMatchRequest {
        starting_score,
        finish_rule,
        legs_to_win,
        players,
    } = request;

    if legs_to_win == 0 {
        return Err(ServiceError::InvalidInput(
            "legs_to_win must be at least 1".into(),
        ));
    }
    if players.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a match requires at least one player".into(),
        ));
    }

    let mut roster = Vec::with_capacity(players.len());
    for name in &players {
        let player = ensure_player(&store, name).await?;
        if roster.iter().any(|seated: &PlayerEntity| seated.id == player.id) {
            return Err(ServiceError::InvalidInput(format!(
                "player `{}` is listed twice",
                player.name
            )));
        }
        roster.push(player);
    }

    let entity = MatchEntity {
        id: Uuid::new_v4(),
        starting_score,
        finish_rule,
        legs_to_win,
        winner_player_id: None,
        completed_at: None,
        ended_early: false,
        created_at: SystemTime::now(),
    };
    store.insert_match(entity.clone()).await?;
    change_feed::publish(
        state,
        RowChangeEvent::Matches(change_feed::inserted(MatchRow::from(&entity))),
    );

    let seats: Vec<MatchPlayerEntity> = roster
        .iter()
        .zip(0u32..)
        .map(|(player, play_order)| MatchPlayerEntity {
            match_id: entity.id,
            player_id: player.id,
            play_order,
        })
        .collect();
    store.replace_match_players(entity.id, seats).await?;

    let first_leg = LegEntity {
        id: Uuid::new_v4(),
        match_id: entity.id,
        leg_number: 1,
        starting_player_id: roster[0].id,
        winner_player_id: None,
        created_at: SystemTime::now(),
    };
    store.insert_leg(first_leg.clone()).await?;
    change_feed::publish(
        state,
        RowChangeEvent::Legs(change_feed::inserted(LegRow::from(&first_leg))),
    );

    info!(
        match_id = %entity.id,
        players = roster.len(),
        starting_score = entity.starting_score.points(),
        "created match"
    );
    summarize(&store, entity).await
}

/// Every stored match, oldest first.
pub async fn list_matches(state: &SharedState) -> Result<Vec<MatchListItem>, ServiceError> {
    let store = state.require_score_store().await?;
    let matches = store.list_matches().await?;
    Ok(matches.iter().map(MatchListItem::from).collect())
}

/// Full description of one match.
pub async fn get_match(state: &SharedState, match_id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let entity = load_match(&store, match_id).await?;
    summarize(&store, entity).await
}

/// Stop an active match without a winner.
pub async fn end_match(state: &SharedState, match_id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let entity = load_match(&store, match_id).await?;
    if !entity.is_active() {
        return Err(ServiceError::InvalidState(format!(
            "match `{match_id}` is already finished"
        )));
    }

    let mut ended = entity.clone();
    ended.ended_early = true;
    ended.completed_at = Some(SystemTime::now());
    store.update_match(ended.clone()).await?;
    change_feed::publish(
        state,
        RowChangeEvent::Matches(change_feed::updated(
            MatchRow::from(&entity),
            MatchRow::from(&ended),
        )),
    );

    info!(%match_id, "match ended early");
    summarize(&store, ended).await
}

/// Record `winner_id` as the winner of `leg_id` and move the match on.
///
/// Idempotent: when the leg already has a winner nothing is written and the
/// current outcome is reported. Completes the match once the winner reaches
/// `legs_to_win`, otherwise opens the next leg with the starting player rotated.
pub async fn complete_leg(
    state: &SharedState,
    leg_id: Uuid,
    winner_id: Uuid,
) -> Result<LegCompletion, ServiceError> {
    let store = state.require_score_store().await?;
    let Some(leg) = store.find_leg(leg_id).await? else {
        return Err(ServiceError::NotFound(format!("leg `{leg_id}` not found")));
    };
    let entity = load_match(&store, leg.match_id).await?;

    if leg.winner_player_id.is_some() {
        debug!(%leg_id, "leg already completed");
        let next_leg_id = store
            .list_legs(entity.id)
            .await?
            .into_iter()
            .find(|candidate| candidate.leg_number == leg.leg_number + 1)
            .map(|candidate| candidate.id);
        return Ok(LegCompletion {
            match_completed: !entity.is_active(),
            next_leg_id,
        });
    }

    let mut won = leg.clone();
    won.winner_player_id = Some(winner_id);
    store.update_leg(won.clone()).await?;
    change_feed::publish(
        state,
        RowChangeEvent::Legs(change_feed::updated(LegRow::from(&leg), LegRow::from(&won))),
    );
    info!(%leg_id, winner = %winner_id, "leg completed");

    if !entity.is_active() {
        return Ok(LegCompletion {
            match_completed: true,
            next_leg_id: None,
        });
    }

    let legs = store.list_legs(entity.id).await?;
    let legs_won = legs
        .iter()
        .filter(|candidate| candidate.id == leg_id || candidate.winner_player_id == Some(winner_id))
        .count() as u32;

    if legs_won >= entity.legs_to_win {
        let mut finished = entity.clone();
        finished.winner_player_id = Some(winner_id);
        finished.completed_at = Some(SystemTime::now());
        store.update_match(finished.clone()).await?;
        change_feed::publish(
            state,
            RowChangeEvent::Matches(change_feed::updated(
                MatchRow::from(&entity),
                MatchRow::from(&finished),
            )),
        );
        info!(match_id = %entity.id, winner = %winner_id, legs_won, "match completed");
        return Ok(LegCompletion {
            match_completed: true,
            next_leg_id: None,
        });
    }

    let next_leg_id = start_next_leg(state, &store, &won).await?;
    Ok(LegCompletion {
        match_completed: false,
        next_leg_id: Some(next_leg_id),
    })
}

/// Open the leg after `previous`, tolerating a concurrent writer that already did.
async fn start_next_leg(
    state: &SharedState,
    store: &Arc<dyn ScoreStore>,
    previous: &LegEntity,
) -> Result<Uuid, ServiceError> {
    let seats = store.list_match_players(previous.match_id).await?;
    let starting_player_id = seat_after(&seats, previous.starting_player_id)
        .unwrap_or(previous.starting_player_id);

    let leg = LegEntity {
        id: Uuid::new_v4(),
        match_id: previous.match_id,
        leg_number: previous.leg_number + 1,
        starting_player_id,
        winner_player_id: None,
        created_at: SystemTime::now(),
    };

    match store.insert_leg(leg.clone()).await {
        Ok(()) => {
            change_feed::publish(
                state,
                RowChangeEvent::Legs(change_feed::inserted(LegRow::from(&leg))),
            );
            info!(leg_id = %leg.id, leg_number = leg.leg_number, "started next leg");
            Ok(leg.id)
        }
        Err(err) if err.is_unique_violation() => {
            warn!(
                match_id = %leg.match_id,
                leg_number = leg.leg_number,
                "next leg already started by a concurrent writer"
            );
            store
                .list_legs(leg.match_id)
                .await?
                .into_iter()
                .find(|existing| existing.leg_number == leg.leg_number)
                .map(|existing| existing.id)
                .ok_or_else(|| {
                    ServiceError::Conflict(format!(
                        "leg {} of match `{}` could not be started",
                        leg.leg_number, leg.match_id
                    ))
                })
        }
        Err(err) => Err(err.into()),
    }
}

/// Replace the play order; `player_ids` must list every seated player exactly once.
pub async fn reorder_players(
    state: &SharedState,
    match_id: Uuid,
    request: ReorderPlayersRequest,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let entity = load_match(&store, match_id).await?;
    let round = FirstRound::load(&store, &entity).await?;

    let mut requested = request.player_ids.clone();
    requested.sort();
    requested.dedup();
    let mut seated: Vec<Uuid> = round.seats.iter().map(|seat| seat.player_id).collect();
    seated.sort();
    if requested.len() != request.player_ids.len() || requested != seated {
        return Err(ServiceError::InvalidInput(
            "new order must list every seated player exactly once".into(),
        ));
    }

    round.reseat(state, &store, request.player_ids).await?;
    summarize(&store, entity).await
}

/// Seat a player (registering the name when unknown) at the end of the rotation.
pub async fn add_player(
    state: &SharedState,
    match_id: Uuid,
    request: AddPlayerRequest,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let entity = load_match(&store, match_id).await?;
    let round = FirstRound::load(&store, &entity).await?;
    let player = ensure_player(&store, &request.name).await?;

    if round.seats.iter().any(|seat| seat.player_id == player.id) {
        return Err(ServiceError::InvalidInput(format!(
            "player `{}` is already seated",
            player.name
        )));
    }

    let mut order: Vec<Uuid> = round.seats.iter().map(|seat| seat.player_id).collect();
    order.push(player.id);
    round.reseat(state, &store, order).await?;
    summarize(&store, entity).await
}

/// Remove a player who has not thrown yet.
pub async fn remove_player(
    state: &SharedState,
    match_id: Uuid,
    player_id: Uuid,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let entity = load_match(&store, match_id).await?;
    let round = FirstRound::load(&store, &entity).await?;

    if !round.seats.iter().any(|seat| seat.player_id == player_id) {
        return Err(ServiceError::NotFound(format!(
            "player `{player_id}` is not seated in match `{match_id}`"
        )));
    }
    if round.seats.len() == 1 {
        return Err(ServiceError::InvalidState(
            "cannot remove the last player of a match".into(),
        ));
    }
    if round.thrown_by.contains(&player_id) {
        return Err(ServiceError::InvalidState(format!(
            "player `{player_id}` has already thrown in this match"
        )));
    }

    let order = round
        .seats
        .iter()
        .map(|seat| seat.player_id)
        .filter(|id| *id != player_id)
        .collect();
    round.reseat(state, &store, order).await?;
    summarize(&store, entity).await
}

/// Seats and first leg of a match that has not completed its first round.
struct FirstRound {
    match_id: Uuid,
    leg: LegEntity,
    seats: Vec<MatchPlayerEntity>,
    thrown_by: Vec<Uuid>,
}

impl FirstRound {
    /// Load the first round, rejecting matches that moved past it.
    async fn load(
        store: &Arc<dyn ScoreStore>,
        entity: &MatchEntity,
    ) -> Result<Self, ServiceError> {
        if !entity.is_active() {
            return Err(ServiceError::InvalidState(format!(
                "match `{}` is finished",
                entity.id
            )));
        }

        let legs = store.list_legs(entity.id).await?;
        let [leg] = legs.as_slice() else {
            return Err(ServiceError::InvalidState(
                "play order can only change during the first leg".into(),
            ));
        };
        let seats = store.list_match_players(entity.id).await?;
        let turns = store.list_turns(leg.id).await?;
        if turns.len() >= seats.len() {
            return Err(ServiceError::InvalidState(
                "play order can only change during the first round".into(),
            ));
        }

        Ok(Self {
            match_id: entity.id,
            leg: leg.clone(),
            seats,
            thrown_by: turns.iter().map(|turn| turn.player_id).collect(),
        })
    }

    /// Persist `order` as the new rotation. Before the first dart the opening
    /// player follows the rotation.
    async fn reseat(
        self,
        state: &SharedState,
        store: &Arc<dyn ScoreStore>,
        order: Vec<Uuid>,
    ) -> Result<(), ServiceError> {
        let seats: Vec<MatchPlayerEntity> = order
            .iter()
            .zip(0u32..)
            .map(|(player_id, play_order)| MatchPlayerEntity {
                match_id: self.match_id,
                player_id: *player_id,
                play_order,
            })
            .collect();
        store.replace_match_players(self.match_id, seats).await?;

        if self.thrown_by.is_empty() {
            if let Some(first) = order.first().copied() {
                if first != self.leg.starting_player_id {
                    let mut leg = self.leg.clone();
                    leg.starting_player_id = first;
                    store.update_leg(leg.clone()).await?;
                    change_feed::publish(
                        state,
                        RowChangeEvent::Legs(change_feed::updated(
                            LegRow::from(&self.leg),
                            LegRow::from(&leg),
                        )),
                    );
                }
            }
        }

        info!(match_id = %self.match_id, players = order.len(), "updated play order");
        Ok(())
    }
}

/// Seat following `player_id` in rotation.
fn seat_after(seats: &[MatchPlayerEntity], player_id: Uuid) -> Option<Uuid> {
    let index = seats.iter().position(|seat| seat.player_id == player_id)?;
    Some(seats[(index + 1) % seats.len()].player_id)
}

/// Find a player by name, creating it when unknown.
async fn ensure_player(
    store: &Arc<dyn ScoreStore>,
    name: &str,
) -> Result<PlayerEntity, ServiceError> {
    let name = name.trim().to_owned();
    if let Some(existing) = store.find_player_by_name(name.clone()).await? {
        return Ok(existing);
    }

    let player = PlayerEntity {
        id: Uuid::new_v4(),
        name: name.clone(),
        created_at: SystemTime::now(),
    };
    match store.insert_player(player.clone()).await {
        Ok(()) => {
            debug!(player_id = %player.id, name = %player.name, "registered player");
            Ok(player)
        }
        // Registered concurrently under the same name.
        Err(err) if err.is_unique_violation() => store
            .find_player_by_name(name.clone())
            .await?
            .ok_or_else(|| ServiceError::Conflict(format!("player `{name}` could not be created"))),
        Err(err) => Err(err.into()),
    }
}

async fn load_match(
    store: &Arc<dyn ScoreStore>,
    match_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))
}

async fn summarize(
    store: &Arc<dyn ScoreStore>,
    entity: MatchEntity,
) -> Result<MatchSummary, ServiceError> {
    let seats = store.list_match_players(entity.id).await?;
    let mut players = Vec::with_capacity(seats.len());
    for seat in &seats {
        let name = store
            .find_player(seat.player_id)
            .await?
            .map(|player| player.name)
            .unwrap_or_default();
        players.push(SeatSummary {
            player_id: seat.player_id,
            name,
            play_order: seat.play_order,
        });
    }

    let legs = store.list_legs(entity.id).await?;
    let mut legs_won: IndexMap<Uuid, u32> =
        seats.iter().map(|seat| (seat.player_id, 0)).collect();
    for winner in legs.iter().filter_map(|leg| leg.winner_player_id) {
        *legs_won.entry(winner).or_default() += 1;
    }

    let current_leg_id = entity
        .is_active()
        .then(|| legs.iter().rev().find(|leg| leg.winner_player_id.is_none()))
        .flatten()
        .map(|leg| leg.id);

    Ok(MatchSummary {
        id: entity.id,
        starting_score: entity.starting_score,
        finish_rule: entity.finish_rule,
        legs_to_win: entity.legs_to_win,
        winner_player_id: entity.winner_player_id,
        ended_early: entity.ended_early,
        completed_at: entity.completed_at.map(format_system_time),
        created_at: format_system_time(entity.created_at),
        active: entity.is_active(),
        players,
        legs: legs.iter().map(LegSummary::from).collect(),
        legs_won: legs_won
            .into_iter()
            .map(|(player_id, legs)| LegsWon { player_id, legs })
            .collect(),
        current_leg_id,
    })
}
