use std::sync::Arc;

use dart_score_back::{
    config::AppConfig,
    dao::score_store::memory::MemoryScoreStore,
    dto::{
        matches::{CreateMatchRequest, MatchSummary},
        throws::{HitInput, RecordThrowRequest, ThrowRecorded},
    },
    error::ServiceError,
    scoring::{FinishRule, StartingScore},
    services::{leg_service, match_service, throw_service, turn_service},
    state::{AppState, RowChangeEvent, SharedState},
};
use uuid::Uuid;

async fn start(
    starting_score: StartingScore,
    finish_rule: FinishRule,
    legs_to_win: u32,
) -> (SharedState, MatchSummary) {
    let state =
        AppState::with_store(AppConfig::default(), Arc::new(MemoryScoreStore::new())).await;
    let summary = match_service::create_match(
        &state,
        CreateMatchRequest {
            starting_score,
            finish_rule,
            legs_to_win,
            players: vec!["Phil".into(), "Michael".into()],
        },
    )
    .await
    .expect("match created");
    (state, summary)
}

async fn throw(state: &SharedState, leg_id: Uuid, label: &str) -> ThrowRecorded {
    throw_service::record_throw(
        state,
        leg_id,
        RecordThrowRequest {
            throw_id: None,
            player_id: None,
            hit: HitInput::Label {
                segment: label.into(),
            },
        },
    )
    .await
    .unwrap_or_else(|err| panic!("dart {label} rejected: {err}"))
}

async fn turn(state: &SharedState, leg_id: Uuid, labels: [&str; 3]) -> ThrowRecorded {
    let mut last = None;
    for label in labels {
        last = Some(throw(state, leg_id, label).await);
    }
    last.expect("three darts")
}

#[tokio::test]
async fn maximum_leaves_three_twenty_one() {
    let (state, summary) = start(StartingScore::S501, FinishRule::DoubleOut, 1).await;
    let leg_id = summary.legs[0].id;

    let recorded = turn(&state, leg_id, ["T20", "T20", "T20"]).await;
    assert_eq!(recorded.outcome.new_score, 321);

    let view = leg_service::leg_view(&state, leg_id).await.expect("view");
    assert_eq!(view.remaining[0].remaining, 321);
    assert_eq!(view.remaining[1].remaining, 501);
    assert_eq!(view.current_player_id, Some(summary.players[1].player_id));
    assert_eq!(view.darts_left, 3);
}

#[tokio::test]
async fn single_out_finishes_on_any_segment() {
    let (state, summary) = start(StartingScore::S201, FinishRule::SingleOut, 1).await;
    let leg_id = summary.legs[0].id;

    turn(&state, leg_id, ["T20", "T20", "T20"]).await;
    turn(&state, leg_id, ["Miss", "Miss", "Miss"]).await;
    let finish = throw(&state, leg_id, "S1").await;
    assert!(!finish.outcome.finished);
    let finish = throw(&state, leg_id, "S20").await;

    assert!(finish.outcome.finished);
    assert!(finish.match_completed);
}

#[tokio::test]
async fn resolving_twice_continues_the_same_turn() {
    let (state, summary) = start(StartingScore::S501, FinishRule::DoubleOut, 1).await;
    let leg_id = summary.legs[0].id;
    let phil = summary.players[0].player_id;

    let first = turn_service::resolve_or_create_turn_for_player(&state, leg_id, phil)
        .await
        .expect("turn");
    let again = turn_service::resolve_or_create_turn_for_player(&state, leg_id, phil)
        .await
        .expect("turn");
    assert_eq!(first.id, again.id);

    let recorded = throw(&state, leg_id, "S5").await;
    assert_eq!(recorded.turn.id, first.id);
}

#[tokio::test]
async fn recompute_twice_writes_nothing_the_second_time() {
    let (state, summary) = start(StartingScore::S501, FinishRule::DoubleOut, 1).await;
    let leg_id = summary.legs[0].id;
    turn(&state, leg_id, ["T20", "S5", "S1"]).await;
    turn(&state, leg_id, ["T19", "T19", "T19"]).await;

    let first = leg_service::recompute_leg(&state, leg_id).await.expect("recompute");
    let second = leg_service::recompute_leg(&state, leg_id).await.expect("recompute");
    assert_eq!(first.turns_examined, 2);
    assert_eq!(first.turns_updated, 0);
    assert_eq!(second.turns_updated, 0);
    assert_eq!(second.finished_by, None);
}

#[tokio::test]
async fn winning_a_leg_opens_the_next_with_the_other_starter() {
    let (state, summary) = start(StartingScore::S201, FinishRule::DoubleOut, 2).await;
    let leg_id = summary.legs[0].id;
    let michael = summary.players[1].player_id;

    turn(&state, leg_id, ["T20", "T20", "T20"]).await;
    turn(&state, leg_id, ["Miss", "Miss", "Miss"]).await;
    // 201 - 180 = 21: S1 then D10.
    throw(&state, leg_id, "S1").await;
    let finish = throw(&state, leg_id, "D10").await;

    assert!(finish.leg_completed);
    assert!(!finish.match_completed);
    let next_leg_id = finish.next_leg_id.expect("second leg");

    let view = leg_service::leg_view(&state, next_leg_id).await.expect("view");
    assert_eq!(view.leg_number, 2);
    assert_eq!(view.starting_player_id, michael);
    assert_eq!(view.current_player_id, Some(michael));

    let summary = match_service::get_match(&state, summary.id).await.expect("match");
    assert_eq!(summary.current_leg_id, Some(next_leg_id));
    assert_eq!(summary.legs_won[0].legs, 1);
}

#[tokio::test]
async fn finishing_on_a_single_busts_under_double_out() {
    let (state, summary) = start(StartingScore::S201, FinishRule::DoubleOut, 1).await;
    let leg_id = summary.legs[0].id;

    turn(&state, leg_id, ["T20", "T20", "T20"]).await;
    turn(&state, leg_id, ["Miss", "Miss", "Miss"]).await;
    throw(&state, leg_id, "S1").await;
    let bust = throw(&state, leg_id, "S20").await;

    assert!(bust.outcome.busted);
    assert!(!bust.leg_completed);
    assert_eq!(bust.outcome.new_score, 20);

    let view = leg_service::leg_view(&state, leg_id).await.expect("view");
    assert_eq!(view.remaining[0].remaining, 21);
}

#[tokio::test]
async fn every_write_is_published_on_the_change_feed() {
    let (state, summary) = start(StartingScore::S501, FinishRule::DoubleOut, 1).await;
    let mut changes = state.changes().subscribe();

    throw(&state, summary.legs[0].id, "T20").await;

    let mut tables = Vec::new();
    while let Ok(change) = changes.try_recv() {
        tables.push(change.table());
        if let RowChangeEvent::Throws(change) = &change {
            assert_eq!(change.row().map(|row| row.segment.as_str()), Some("T20"));
        }
    }
    assert_eq!(tables, vec!["turns", "throws", "turns"]);
}

#[tokio::test]
async fn darts_cannot_be_added_after_the_match_ended() {
    let (state, summary) = start(StartingScore::S501, FinishRule::DoubleOut, 1).await;
    match_service::end_match(&state, summary.id).await.expect("ended");

    let err = throw_service::record_throw(
        &state,
        summary.legs[0].id,
        RecordThrowRequest {
            throw_id: None,
            player_id: None,
            hit: HitInput::Miss,
        },
    )
    .await
    .expect_err("match is over");
    assert!(matches!(err, ServiceError::InvalidState(_)));
}
