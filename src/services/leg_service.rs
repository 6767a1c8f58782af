use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{LegEntity, MatchEntity, MatchPlayerEntity, ThrowEntity, TurnEntity},
        score_store::ScoreStore,
    },
    dto::{
        checkout::route_labels,
        legs::{LegView, PlayerRemaining, RecomputeResponse, TurnSummary},
        throws::ThrowSummary,
    },
    error::ServiceError,
    scoring::{
        FinishRule,
        checkout::compute_checkout_suggestions,
        leg::{LegReplay, ReplayTurn, replay_leg},
        realtime::{ThrowView, TurnRow, TurnView},
        x01::{DARTS_PER_TURN, remaining_score},
    },
    services::change_feed,
    state::{RowChangeEvent, SharedState},
};

/// Whose darts are expected next in a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTurn {
    pub player_id: Uuid,
    /// Darts already thrown in the player's open turn.
    pub darts_thrown: usize,
}

impl CurrentTurn {
    /// Darts the player may still throw this turn.
    pub fn darts_left(&self) -> u32 {
        DARTS_PER_TURN.saturating_sub(self.darts_thrown) as u32
    }
}

/// Everything stored about one leg, loaded in a handful of reads.
#[derive(Debug, Clone)]
pub struct LegSnapshot {
    pub match_entity: MatchEntity,
    pub leg: LegEntity,
    /// Seats ordered by play order.
    pub seats: Vec<MatchPlayerEntity>,
    /// Turns ordered by turn number.
    pub turns: Vec<TurnEntity>,
    throws: HashMap<Uuid, Vec<ThrowEntity>>,
}

impl LegSnapshot {
    /// Load a leg with its match, seats, turns and darts.
    pub async fn load(store: &Arc<dyn ScoreStore>, leg_id: Uuid) -> Result<Self, ServiceError> {
        let Some(leg) = store.find_leg(leg_id).await? else {
            return Err(ServiceError::NotFound(format!("leg `{leg_id}` not found")));
        };
        let Some(match_entity) = store.find_match(leg.match_id).await? else {
            return Err(ServiceError::NotFound(format!(
                "match `{}` not found",
                leg.match_id
            )));
        };
        let seats = store.list_match_players(match_entity.id).await?;
        let turns = store.list_turns(leg_id).await?;
        let turn_ids = turns.iter().map(|turn| turn.id).collect();

        let mut throws: HashMap<Uuid, Vec<ThrowEntity>> = HashMap::new();
        for throw in store.list_throws(turn_ids).await? {
            throws.entry(throw.turn_id).or_default().push(throw);
        }
        for darts in throws.values_mut() {
            darts.sort_by_key(|throw| throw.dart_index);
        }

        Ok(Self {
            match_entity,
            leg,
            seats,
            turns,
            throws,
        })
    }

    /// Darts of `turn_id`, ordered by dart index.
    pub fn throws_of(&self, turn_id: Uuid) -> &[ThrowEntity] {
        self.throws.get(&turn_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Score every leg of the match starts from.
    pub fn start_score(&self) -> u32 {
        self.match_entity.starting_score.points()
    }

    /// Finish rule of the match.
    pub fn finish_rule(&self) -> FinishRule {
        self.match_entity.finish_rule
    }

    /// Replay the recorded darts from scratch.
    pub fn replay(&self) -> LegReplay {
        let turns: Vec<ReplayTurn> = self
            .turns
            .iter()
            .map(|turn| ReplayTurn {
                turn_id: turn.id,
                player_id: turn.player_id,
                is_tiebreak: turn.is_tiebreak,
                segments: self
                    .throws_of(turn.id)
                    .iter()
                    .map(|throw| throw.segment)
                    .collect(),
            })
            .collect();
        replay_leg(self.start_score(), self.finish_rule(), &turns)
    }

    /// Remaining score of `player_id` derived from the cached turn totals.
    pub fn remaining_for(&self, player_id: Uuid) -> u32 {
        remaining_score(
            self.start_score(),
            self.turns
                .iter()
                .filter(|turn| turn.player_id == player_id && !turn.is_tiebreak && !turn.busted)
                .map(|turn| turn.total_scored),
        )
    }

    /// Player on the oche: the owner of the open turn, otherwise the next seat in
    /// rotation after the latest turn, or the leg's starting player when nobody threw yet.
    pub fn current_turn(&self) -> Option<CurrentTurn> {
        if self.leg.winner_player_id.is_some() {
            return None;
        }

        let Some(latest) = self.turns.last() else {
            return Some(CurrentTurn {
                player_id: self.leg.starting_player_id,
                darts_thrown: 0,
            });
        };

        let darts_thrown = self.throws_of(latest.id).len();
        if !latest.busted && darts_thrown < DARTS_PER_TURN {
            return Some(CurrentTurn {
                player_id: latest.player_id,
                darts_thrown,
            });
        }

        self.next_in_rotation(latest.player_id)
            .map(|player_id| CurrentTurn {
                player_id,
                darts_thrown: 0,
            })
    }

    fn next_in_rotation(&self, player_id: Uuid) -> Option<Uuid> {
        if self.seats.is_empty() {
            return None;
        }
        let next = match self.seats.iter().position(|seat| seat.player_id == player_id) {
            Some(index) => (index + 1) % self.seats.len(),
            // The latest thrower left the match; restart the rotation.
            None => 0,
        };
        Some(self.seats[next].player_id)
    }

    /// Player ids in play order, followed by anyone who threw but is no longer seated.
    pub fn participants(&self) -> Vec<Uuid> {
        let mut players: Vec<Uuid> = self.seats.iter().map(|seat| seat.player_id).collect();
        for turn in &self.turns {
            if !players.contains(&turn.player_id) {
                players.push(turn.player_id);
            }
        }
        players
    }

    /// Turns with their darts as shown to spectators.
    pub fn spectator_turns(&self) -> Vec<TurnView> {
        self.turns
            .iter()
            .map(|turn| TurnView {
                id: turn.id,
                leg_id: turn.leg_id,
                player_id: turn.player_id,
                turn_number: turn.turn_number,
                total_scored: turn.total_scored,
                busted: turn.busted,
                throws: self
                    .throws_of(turn.id)
                    .iter()
                    .map(|throw| ThrowView {
                        id: Some(throw.id),
                        dart_index: throw.dart_index,
                        segment: throw.segment.label(),
                        scored: throw.scored,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Turn with its darts in response form.
    pub fn turn_summary(&self, turn: &TurnEntity) -> TurnSummary {
        TurnSummary::new(
            turn,
            self.throws_of(turn.id)
                .iter()
                .map(ThrowSummary::from)
                .collect(),
        )
    }
}

/// Replay every dart of `leg_id` from `start_score` and rewrite the cached turn
/// totals and bust flags that disagree with the replay.
///
/// Only changed turns are written, so calling this twice in a row performs no
/// writes the second time.
pub async fn recompute_leg_turns(
    state: &SharedState,
    leg_id: Uuid,
    start_score: u32,
    finish_rule: FinishRule,
) -> Result<RecomputeResponse, ServiceError> {
    let store = state.require_score_store().await?;
    let turns = store.list_turns(leg_id).await?;
    let turn_ids = turns.iter().map(|turn| turn.id).collect();
    let mut darts: HashMap<Uuid, Vec<ThrowEntity>> = HashMap::new();
    for throw in store.list_throws(turn_ids).await? {
        darts.entry(throw.turn_id).or_default().push(throw);
    }

    let replay_turns: Vec<ReplayTurn> = turns
        .iter()
        .map(|turn| {
            let mut recorded = darts.remove(&turn.id).unwrap_or_default();
            recorded.sort_by_key(|throw| throw.dart_index);
            ReplayTurn {
                turn_id: turn.id,
                player_id: turn.player_id,
                is_tiebreak: turn.is_tiebreak,
                segments: recorded.into_iter().map(|throw| throw.segment).collect(),
            }
        })
        .collect();
    let replay = replay_leg(start_score, finish_rule, &replay_turns);

    let stored: HashMap<Uuid, &TurnEntity> = turns.iter().map(|turn| (turn.id, turn)).collect();
    let mut turns_updated = 0;
    for score in &replay.turns {
        let Some(turn) = stored.get(&score.turn_id) else {
            continue;
        };
        let outcome = score.outcome;
        if turn.total_scored == outcome.total_scored && turn.busted == outcome.busted {
            continue;
        }

        store
            .update_turn_score(turn.id, outcome.total_scored, outcome.busted)
            .await?;
        turns_updated += 1;
        debug!(
            turn_id = %turn.id,
            total_scored = outcome.total_scored,
            busted = outcome.busted,
            "rewrote turn score"
        );

        let old = TurnRow::from(*turn);
        let new = TurnRow {
            total_scored: outcome.total_scored,
            busted: outcome.busted,
            ..old.clone()
        };
        change_feed::publish(state, RowChangeEvent::Turns(change_feed::updated(old, new)));
    }

    info!(
        %leg_id,
        turns_examined = replay.turns.len(),
        turns_updated,
        "recomputed leg"
    );

    Ok(RecomputeResponse {
        leg_id,
        turns_examined: replay.turns.len(),
        turns_updated,
        finished_by: replay.finished_by,
    })
}

/// Recompute `leg_id` using its match's starting score and finish rule.
pub async fn recompute_leg(
    state: &SharedState,
    leg_id: Uuid,
) -> Result<RecomputeResponse, ServiceError> {
    let store = state.require_score_store().await?;
    let snapshot = LegSnapshot::load(&store, leg_id).await?;
    recompute_leg_turns(
        state,
        leg_id,
        snapshot.start_score(),
        snapshot.finish_rule(),
    )
    .await
}

/// Scoreboard view of a leg: turns, remaining scores, current player and checkout routes.
pub async fn leg_view(state: &SharedState, leg_id: Uuid) -> Result<LegView, ServiceError> {
    let store = state.require_score_store().await?;
    let snapshot = LegSnapshot::load(&store, leg_id).await?;
    Ok(build_leg_view(&snapshot))
}

/// Assemble the scoreboard view from an already loaded snapshot.
pub fn build_leg_view(snapshot: &LegSnapshot) -> LegView {
    let current = snapshot.current_turn();
    let remaining = snapshot
        .participants()
        .into_iter()
        .map(|player_id| PlayerRemaining {
            player_id,
            remaining: snapshot.remaining_for(player_id),
        })
        .collect();

    let checkout = current
        .map(|turn| {
            route_labels(&compute_checkout_suggestions(
                snapshot.remaining_for(turn.player_id),
                turn.darts_left(),
                snapshot.finish_rule(),
            ))
        })
        .unwrap_or_default();

    LegView {
        id: snapshot.leg.id,
        match_id: snapshot.leg.match_id,
        leg_number: snapshot.leg.leg_number,
        starting_player_id: snapshot.leg.starting_player_id,
        winner_player_id: snapshot.leg.winner_player_id,
        current_player_id: current.map(|turn| turn.player_id),
        darts_left: current.map_or(0, |turn| turn.darts_left()),
        remaining,
        turns: snapshot
            .turns
            .iter()
            .map(|turn| snapshot.turn_summary(turn))
            .collect(),
        checkout,
    }
}
