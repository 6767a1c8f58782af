//! Deterministic replay of a whole leg from its recorded darts.

use indexmap::IndexMap;
use uuid::Uuid;

use super::{
    segment::Segment,
    x01::{FinishRule, TurnOutcome, replay_turn},
};

/// One recorded turn fed into [`replay_leg`], in turn-number order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayTurn {
    pub turn_id: Uuid,
    pub player_id: Uuid,
    /// Tiebreak rounds are scored on their own and never touch the X01 ladder.
    pub is_tiebreak: bool,
    /// Darts ordered by dart index.
    pub segments: Vec<Segment>,
}

/// Recomputed result for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnScore {
    pub turn_id: Uuid,
    pub player_id: Uuid,
    /// Score the player stood on when the turn started.
    pub start_score: u32,
    pub outcome: TurnOutcome,
}

/// Outcome of replaying a leg.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegReplay {
    /// Scored turns in replay order (tiebreak turns are omitted).
    pub turns: Vec<TurnScore>,
    /// Remaining score per player, in order of first appearance.
    pub remaining: IndexMap<Uuid, u32>,
    /// First player whose turn finished the leg.
    pub finished_by: Option<Uuid>,
}

/// Replay every non-tiebreak turn from `start_score`, keeping one running score per player.
pub fn replay_leg(start_score: u32, rule: FinishRule, turns: &[ReplayTurn]) -> LegReplay {
    let mut replay = LegReplay::default();

    for turn in turns.iter().filter(|turn| !turn.is_tiebreak) {
        let score = replay
            .remaining
            .entry(turn.player_id)
            .or_insert(start_score);
        let turn_start = *score;
        let outcome = replay_turn(turn_start, turn.segments.iter().copied(), rule);
        *score = outcome.end_score;

        if outcome.finished && replay.finished_by.is_none() {
            replay.finished_by = Some(turn.player_id);
        }

        replay.turns.push(TurnScore {
            turn_id: turn.turn_id,
            player_id: turn.player_id,
            start_score: turn_start,
            outcome,
        });
    }

    replay
}
