use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ThrowEntity, TurnEntity},
        score_store::{ScoreStore, THROW_ID_KEY},
        storage::StorageError,
    },
    dto::{
        legs::RecomputeResponse,
        throws::{
            EditThrowRequest, RecordThrowRequest, ThrowChangeResponse, ThrowRecorded,
            ThrowSummary,
        },
    },
    error::ServiceError,
    scoring::{
        apply_throw,
        realtime::TurnRow,
        x01::{DARTS_PER_TURN, replay_turn},
    },
    services::{
        change_feed,
        leg_service::{self, LegSnapshot},
        match_service, turn_service,
    },
    state::{RowChangeEvent, SharedState},
};

/// Record the next dart of `leg_id`.
///
/// The dart is attributed to the player currently on the oche. Submitting a
/// `throw_id` that is already stored returns the original dart with
/// `duplicate = true` and writes nothing. A checkout completes the leg and,
/// when the winner reaches the target, the match.
pub async fn record_throw(
    state: &SharedState,
    leg_id: Uuid,
    request: RecordThrowRequest,
) -> Result<ThrowRecorded, ServiceError> {
    let store = state.require_score_store().await?;
    let segment = request.hit.resolve(&state.config().board);

    if let Some(throw_id) = request.throw_id {
        if let Some(existing) = store.find_throw(throw_id).await? {
            debug!(%throw_id, "throw already recorded");
            return describe_duplicate(&store, leg_id, existing).await;
        }
    }

    let snapshot = LegSnapshot::load(&store, leg_id).await?;
    if !snapshot.match_entity.is_active() {
        return Err(ServiceError::InvalidState(format!(
            "match `{}` is finished",
            snapshot.match_entity.id
        )));
    }
    if snapshot.leg.winner_player_id.is_some() {
        return Err(ServiceError::InvalidState(format!(
            "leg `{leg_id}` is already won"
        )));
    }

    let replay = snapshot.replay();
    if let Some(winner) = replay.finished_by {
        // A previous request stored the checkout but did not complete the leg.
        warn!(%leg_id, %winner, "leg was checked out without a winner; completing it");
        match_service::complete_leg(state, leg_id, winner).await?;
        return Err(ServiceError::InvalidState(format!(
            "leg `{leg_id}` is already won"
        )));
    }

    let Some(current) = snapshot.current_turn() else {
        return Err(ServiceError::InvalidState(format!(
            "leg `{leg_id}` has no player to throw"
        )));
    };
    if let Some(expected) = request.player_id {
        if expected != current.player_id {
            return Err(ServiceError::InvalidState(format!(
                "player `{expected}` is not on the oche; `{}` is",
                current.player_id
            )));
        }
    }

    let turn =
        turn_service::resolve_or_create_turn_for_player(state, leg_id, current.player_id).await?;
    let prior = store.list_throws(vec![turn.id]).await?;
    if prior.len() >= DARTS_PER_TURN {
        return Err(ServiceError::Conflict(format!(
            "turn `{}` already has {DARTS_PER_TURN} darts",
            turn.id
        )));
    }

    let rule = snapshot.finish_rule();
    let turn_start = replay
        .turns
        .iter()
        .find(|score| score.turn_id == turn.id)
        .map(|score| score.start_score)
        .or_else(|| replay.remaining.get(&turn.player_id).copied())
        .unwrap_or_else(|| snapshot.start_score());
    let before = replay_turn(turn_start, prior.iter().map(|throw| throw.segment), rule);
    if before.busted || before.finished {
        return Err(ServiceError::Conflict(format!(
            "turn `{}` is already closed",
            turn.id
        )));
    }

    let dart_index = prior.len() as u8 + 1;
    let throw = ThrowEntity::new(
        request.throw_id.unwrap_or_else(Uuid::new_v4),
        turn.id,
        dart_index,
        segment,
    );
    match store.insert_throw(throw.clone()).await {
        Ok(()) => {}
        Err(StorageError::UniqueViolation {
            constraint: THROW_ID_KEY,
        }) => {
            debug!(throw_id = %throw.id, "throw recorded concurrently");
            let Some(existing) = store.find_throw(throw.id).await? else {
                return Err(ServiceError::Conflict(format!(
                    "throw `{}` could not be recorded",
                    throw.id
                )));
            };
            return describe_duplicate(&store, leg_id, existing).await;
        }
        Err(err) if err.is_unique_violation() => {
            return Err(ServiceError::Conflict(format!(
                "dart {dart_index} of turn `{}` was recorded concurrently",
                turn.id
            )));
        }
        Err(err) => return Err(err.into()),
    }
    change_feed::publish(
        state,
        RowChangeEvent::Throws(change_feed::inserted(throw.change_row(leg_id))),
    );

    let outcome = apply_throw(before.end_score, segment, rule);
    let after = replay_turn(
        turn_start,
        prior
            .iter()
            .map(|recorded| recorded.segment)
            .chain(std::iter::once(segment)),
        rule,
    );
    store_turn_score(state, &store, &turn, after.total_scored, after.busted).await?;

    info!(
        %leg_id,
        turn_id = %turn.id,
        dart_index,
        segment = %segment.label(),
        new_score = outcome.new_score,
        busted = outcome.busted,
        finished = outcome.finished,
        "recorded throw"
    );

    let completion = if outcome.finished {
        match_service::complete_leg(state, leg_id, turn.player_id).await?
    } else {
        match_service::LegCompletion::default()
    };

    let snapshot = LegSnapshot::load(&store, leg_id).await?;
    describe(&snapshot, &throw, false, completion.next_leg_id)
}

/// Replace the segment of a recorded dart and recompute its leg.
pub async fn edit_throw(
    state: &SharedState,
    throw_id: Uuid,
    request: EditThrowRequest,
) -> Result<ThrowChangeResponse, ServiceError> {
    let store = state.require_score_store().await?;
    let segment = request.hit.resolve(&state.config().board);
    let (throw, turn) = load_throw(&store, throw_id).await?;

    let edited = ThrowEntity {
        segment,
        scored: segment.scored(),
        ..throw.clone()
    };
    store.update_throw(edited.clone()).await?;
    change_feed::publish(
        state,
        RowChangeEvent::Throws(change_feed::updated(
            throw.change_row(turn.leg_id),
            edited.change_row(turn.leg_id),
        )),
    );
    info!(
        %throw_id,
        from = %throw.segment.label(),
        to = %segment.label(),
        "edited throw"
    );

    let recompute = reconcile_leg(state, turn.leg_id).await?;
    Ok(ThrowChangeResponse {
        throw: Some(ThrowSummary::from(&edited)),
        recompute,
    })
}

/// Remove a recorded dart, close the gap in its turn and recompute the leg.
pub async fn delete_throw(
    state: &SharedState,
    throw_id: Uuid,
) -> Result<ThrowChangeResponse, ServiceError> {
    let store = state.require_score_store().await?;
    let (throw, turn) = load_throw(&store, throw_id).await?;

    if !store.delete_throw(throw_id).await? {
        return Err(ServiceError::NotFound(format!(
            "throw `{throw_id}` not found"
        )));
    }
    change_feed::publish(
        state,
        RowChangeEvent::Throws(change_feed::deleted(throw.change_row(turn.leg_id))),
    );

    let mut later: Vec<ThrowEntity> = store
        .list_throws(vec![turn.id])
        .await?
        .into_iter()
        .filter(|other| other.dart_index > throw.dart_index)
        .collect();
    later.sort_by_key(|other| other.dart_index);
    for moved in later {
        let shifted = ThrowEntity {
            dart_index: moved.dart_index - 1,
            ..moved.clone()
        };
        store.update_throw(shifted.clone()).await?;
        change_feed::publish(
            state,
            RowChangeEvent::Throws(change_feed::updated(
                moved.change_row(turn.leg_id),
                shifted.change_row(turn.leg_id),
            )),
        );
    }
    info!(%throw_id, turn_id = %turn.id, "deleted throw");

    let recompute = reconcile_leg(state, turn.leg_id).await?;
    Ok(ThrowChangeResponse {
        throw: None,
        recompute,
    })
}

/// Recompute cached totals and complete the leg if the corrected darts now check it out.
async fn reconcile_leg(
    state: &SharedState,
    leg_id: Uuid,
) -> Result<RecomputeResponse, ServiceError> {
    let recompute = leg_service::recompute_leg(state, leg_id).await?;
    if let Some(winner) = recompute.finished_by {
        let store = state.require_score_store().await?;
        let leg = store.find_leg(leg_id).await?;
        if leg.is_some_and(|leg| leg.winner_player_id.is_none()) {
            match_service::complete_leg(state, leg_id, winner).await?;
        }
    }
    Ok(recompute)
}

async fn load_throw(
    store: &Arc<dyn ScoreStore>,
    throw_id: Uuid,
) -> Result<(ThrowEntity, TurnEntity), ServiceError> {
    let Some(throw) = store.find_throw(throw_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "throw `{throw_id}` not found"
        )));
    };
    let Some(turn) = store.find_turn(throw.turn_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "turn `{}` not found",
            throw.turn_id
        )));
    };
    Ok((throw, turn))
}

/// Write the turn's cached score when it changed, publishing the update.
async fn store_turn_score(
    state: &SharedState,
    store: &Arc<dyn ScoreStore>,
    turn: &TurnEntity,
    total_scored: u32,
    busted: bool,
) -> Result<(), ServiceError> {
    if turn.total_scored == total_scored && turn.busted == busted {
        return Ok(());
    }
    store.update_turn_score(turn.id, total_scored, busted).await?;

    let old = TurnRow::from(turn);
    let new = TurnRow {
        total_scored,
        busted,
        ..old.clone()
    };
    change_feed::publish(state, RowChangeEvent::Turns(change_feed::updated(old, new)));
    Ok(())
}

async fn describe_duplicate(
    store: &Arc<dyn ScoreStore>,
    leg_id: Uuid,
    existing: ThrowEntity,
) -> Result<ThrowRecorded, ServiceError> {
    let turn = store.find_turn(existing.turn_id).await?;
    if turn.as_ref().is_none_or(|turn| turn.leg_id != leg_id) {
        return Err(ServiceError::Conflict(format!(
            "throw `{}` belongs to another leg",
            existing.id
        )));
    }

    let snapshot = LegSnapshot::load(store, leg_id).await?;
    let next_leg_id = if snapshot.leg.winner_player_id.is_some() {
        store
            .list_legs(snapshot.leg.match_id)
            .await?
            .into_iter()
            .find(|leg| leg.leg_number == snapshot.leg.leg_number + 1)
            .map(|leg| leg.id)
    } else {
        None
    };
    describe(&snapshot, &existing, true, next_leg_id)
}

/// Response for `throw` as it stands in `snapshot`.
fn describe(
    snapshot: &LegSnapshot,
    throw: &ThrowEntity,
    duplicate: bool,
    next_leg_id: Option<Uuid>,
) -> Result<ThrowRecorded, ServiceError> {
    let Some(turn) = snapshot.turns.iter().find(|turn| turn.id == throw.turn_id) else {
        return Err(ServiceError::NotFound(format!(
            "turn `{}` not found",
            throw.turn_id
        )));
    };

    let rule = snapshot.finish_rule();
    let replay = snapshot.replay();
    let turn_start = replay
        .turns
        .iter()
        .find(|score| score.turn_id == turn.id)
        .map(|score| score.start_score)
        .unwrap_or_else(|| snapshot.remaining_for(turn.player_id));
    let before = replay_turn(
        turn_start,
        snapshot
            .throws_of(turn.id)
            .iter()
            .filter(|earlier| earlier.dart_index < throw.dart_index)
            .map(|earlier| earlier.segment),
        rule,
    );
    let outcome = apply_throw(before.end_score, throw.segment, rule);

    Ok(ThrowRecorded {
        throw: ThrowSummary::from(throw),
        turn: snapshot.turn_summary(turn),
        outcome: outcome.into(),
        duplicate,
        leg_completed: snapshot.leg.winner_player_id.is_some(),
        match_completed: !snapshot.match_entity.is_active(),
        next_leg_id,
        next_player_id: snapshot.current_turn().map(|current| current.player_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::score_store::memory::MemoryScoreStore,
        dto::{
            matches::{CreateMatchRequest, MatchSummary},
            throws::HitInput,
        },
        scoring::{FinishRule, StartingScore},
        state::AppState,
    };

    async fn game(starting_score: StartingScore) -> (SharedState, MatchSummary) {
        let state =
            AppState::with_store(AppConfig::default(), Arc::new(MemoryScoreStore::new())).await;
        let summary = match_service::create_match(
            &state,
            CreateMatchRequest {
                starting_score,
                finish_rule: FinishRule::DoubleOut,
                legs_to_win: 1,
                players: vec!["Ann".into(), "Bo".into()],
            },
        )
        .await
        .expect("match created");
        (state, summary)
    }

    fn dart(label: &str) -> RecordThrowRequest {
        RecordThrowRequest {
            throw_id: None,
            player_id: None,
            hit: HitInput::Label {
                segment: label.into(),
            },
        }
    }

    async fn throw_all(state: &SharedState, leg_id: Uuid, labels: &[&str]) -> ThrowRecorded {
        let mut last = None;
        for label in labels {
            last = Some(record_throw(state, leg_id, dart(label)).await.expect("recorded"));
        }
        last.expect("at least one dart")
    }

    #[tokio::test]
    async fn a_full_turn_passes_the_oche_to_the_next_player() {
        let (state, summary) = game(StartingScore::S501).await;
        let leg_id = summary.legs[0].id;

        let recorded = throw_all(&state, leg_id, &["T20", "T20", "T20"]).await;
        assert_eq!(recorded.outcome.new_score, 321);
        assert_eq!(recorded.turn.total_scored, 180);
        assert_eq!(recorded.turn.throws.len(), 3);
        assert_eq!(recorded.next_player_id, Some(summary.players[1].player_id));
    }

    #[tokio::test]
    async fn resubmitting_a_throw_id_is_a_no_op() {
        let (state, summary) = game(StartingScore::S501).await;
        let leg_id = summary.legs[0].id;
        let request = RecordThrowRequest {
            throw_id: Some(Uuid::new_v4()),
            ..dart("T20")
        };

        let first = record_throw(&state, leg_id, request.clone()).await.expect("first");
        let second = record_throw(&state, leg_id, request).await.expect("second");
        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.throw.id, second.throw.id);
        assert_eq!(second.turn.throws.len(), 1);
        assert_eq!(second.outcome.new_score, 441);
    }

    #[tokio::test]
    async fn darts_from_the_wrong_player_are_rejected() {
        let (state, summary) = game(StartingScore::S501).await;
        let request = RecordThrowRequest {
            player_id: Some(summary.players[1].player_id),
            ..dart("S5")
        };

        let err = record_throw(&state, summary.legs[0].id, request)
            .await
            .expect_err("not on the oche");
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn leaving_one_busts_and_ends_the_turn() {
        let (state, summary) = game(StartingScore::S301).await;
        let leg_id = summary.legs[0].id;

        throw_all(&state, leg_id, &["T20", "T20", "T20"]).await;
        throw_all(&state, leg_id, &["Miss", "Miss", "Miss"]).await;
        // 121 - 60 - 60 = 1
        throw_all(&state, leg_id, &["T20"]).await;
        let bust = throw_all(&state, leg_id, &["T20"]).await;
        assert!(bust.outcome.busted);
        assert_eq!(bust.turn.total_scored, 0);
        assert!(bust.turn.busted);
        assert_eq!(bust.next_player_id, Some(summary.players[1].player_id));

        let view = leg_service::leg_view(&state, leg_id).await.expect("view");
        assert_eq!(view.remaining[0].remaining, 121);
    }

    #[tokio::test]
    async fn a_double_checkout_wins_the_match() {
        let (state, summary) = game(StartingScore::S301).await;
        let leg_id = summary.legs[0].id;

        throw_all(&state, leg_id, &["T20", "T20", "T20"]).await;
        throw_all(&state, leg_id, &["Miss", "Miss", "Miss"]).await;
        let finish = throw_all(&state, leg_id, &["T20", "T11", "D14"]).await;

        assert!(finish.outcome.finished);
        assert!(finish.leg_completed);
        assert!(finish.match_completed);
        assert_eq!(finish.next_player_id, None);

        let err = record_throw(&state, leg_id, dart("S1"))
            .await
            .expect_err("leg is over");
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn editing_a_dart_rewrites_the_turn_total() {
        let (state, summary) = game(StartingScore::S501).await;
        let leg_id = summary.legs[0].id;
        let recorded = throw_all(&state, leg_id, &["T20", "T20", "T20"]).await;

        let changed = edit_throw(
            &state,
            recorded.throw.id,
            EditThrowRequest {
                hit: HitInput::Label {
                    segment: "S20".into(),
                },
            },
        )
        .await
        .expect("edited");
        assert_eq!(changed.recompute.turns_updated, 1);

        let view = leg_service::leg_view(&state, leg_id).await.expect("view");
        assert_eq!(view.turns[0].total_scored, 140);
        assert_eq!(view.remaining[0].remaining, 361);
    }

    #[tokio::test]
    async fn deleting_a_dart_closes_the_gap() {
        let (state, summary) = game(StartingScore::S501).await;
        let leg_id = summary.legs[0].id;
        let first = throw_all(&state, leg_id, &["S1"]).await;
        throw_all(&state, leg_id, &["S2"]).await;

        let changed = delete_throw(&state, first.throw.id).await.expect("deleted");
        assert!(changed.throw.is_none());

        let view = leg_service::leg_view(&state, leg_id).await.expect("view");
        assert_eq!(view.turns[0].throws.len(), 1);
        assert_eq!(view.turns[0].throws[0].dart_index, 1);
        assert_eq!(view.turns[0].total_scored, 2);
        assert_eq!(view.darts_left, 2);

        let next = throw_all(&state, leg_id, &["S3"]).await;
        assert_eq!(next.throw.dart_index, 2);
    }
}
