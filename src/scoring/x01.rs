//! X01 scoring rules: applying darts to a remaining score under a finish rule.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::segment::Segment;

/// Darts a player throws per turn.
pub const DARTS_PER_TURN: usize = 3;

/// Rule deciding which darts may finish a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishRule {
    /// Any segment reducing the score to exactly zero finishes.
    SingleOut,
    /// Only a double or the inner bull may reduce the score to zero.
    DoubleOut,
}

/// Starting scores a match can be played from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum StartingScore {
    S201,
    S301,
    S501,
    S701,
}

impl StartingScore {
    /// Points a player starts each leg with.
    pub fn points(self) -> u32 {
        match self {
            StartingScore::S201 => 201,
            StartingScore::S301 => 301,
            StartingScore::S501 => 501,
            StartingScore::S701 => 701,
        }
    }
}

impl TryFrom<u32> for StartingScore {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            201 => Ok(StartingScore::S201),
            301 => Ok(StartingScore::S301),
            501 => Ok(StartingScore::S501),
            701 => Ok(StartingScore::S701),
            other => Err(format!(
                "unsupported starting score {other} (expected 201, 301, 501 or 701)"
            )),
        }
    }
}

impl From<StartingScore> for u32 {
    fn from(value: StartingScore) -> Self {
        value.points()
    }
}

/// Result of applying a single dart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrowOutcome {
    /// Score after the dart; equals the input score when the dart busts.
    pub new_score: u32,
    pub busted: bool,
    pub finished: bool,
}

/// Apply one dart to `current_score`.
///
/// Under double-out a dart busts when it overshoots, leaves exactly 1, or
/// reaches zero on anything other than a double or the inner bull.
pub fn apply_throw(current_score: u32, segment: Segment, rule: FinishRule) -> ThrowOutcome {
    let bust = ThrowOutcome {
        new_score: current_score,
        busted: true,
        finished: false,
    };

    let Some(candidate) = current_score.checked_sub(segment.scored()) else {
        return bust;
    };

    match (candidate, rule) {
        (0, FinishRule::SingleOut) => ThrowOutcome {
            new_score: 0,
            busted: false,
            finished: true,
        },
        (0, FinishRule::DoubleOut) if segment.is_double_out_finisher() => ThrowOutcome {
            new_score: 0,
            busted: false,
            finished: true,
        },
        (0, FinishRule::DoubleOut) | (1, FinishRule::DoubleOut) => bust,
        (remaining, _) => ThrowOutcome {
            new_score: remaining,
            busted: false,
            finished: false,
        },
    }
}

/// Outcome of replaying every dart of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// Points credited for the turn (0 when busted).
    pub total_scored: u32,
    pub busted: bool,
    pub finished: bool,
    /// Remaining score after the turn. A bust restores the score at turn start.
    pub end_score: u32,
    /// Darts consumed before the turn stopped.
    pub darts_used: usize,
}

/// Replay a turn's darts from `start_score`, stopping at the first bust or finish.
pub fn replay_turn<I>(start_score: u32, segments: I, rule: FinishRule) -> TurnOutcome
where
    I: IntoIterator<Item = Segment>,
{
    let mut score = start_score;
    let mut darts_used = 0;

    for segment in segments.into_iter().take(DARTS_PER_TURN) {
        darts_used += 1;
        let outcome = apply_throw(score, segment, rule);
        if outcome.busted {
            return TurnOutcome {
                total_scored: 0,
                busted: true,
                finished: false,
                end_score: start_score,
                darts_used,
            };
        }
        score = outcome.new_score;
        if outcome.finished {
            return TurnOutcome {
                total_scored: start_score - score,
                busted: false,
                finished: true,
                end_score: score,
                darts_used,
            };
        }
    }

    TurnOutcome {
        total_scored: start_score - score,
        busted: false,
        finished: false,
        end_score: score,
        darts_used,
    }
}

/// Remaining score given the credited totals of a player's turns, floored at zero.
pub fn remaining_score<I>(start_score: u32, credited_totals: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    credited_totals
        .into_iter()
        .fold(start_score, |score, total| score.saturating_sub(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_dart_reduces_score() {
        let outcome = apply_throw(501, Segment::Triple(20), FinishRule::DoubleOut);
        assert_eq!(
            outcome,
            ThrowOutcome {
                new_score: 441,
                busted: false,
                finished: false
            }
        );
    }

    #[test]
    fn overshoot_busts() {
        let outcome = apply_throw(40, Segment::Triple(20), FinishRule::SingleOut);
        assert!(outcome.busted);
        assert_eq!(outcome.new_score, 40);
    }

    #[test]
    fn double_out_requires_double_to_finish() {
        assert!(apply_throw(40, Segment::Double(20), FinishRule::DoubleOut).finished);
        assert!(apply_throw(50, Segment::InnerBull, FinishRule::DoubleOut).finished);

        let single = apply_throw(20, Segment::Single(20), FinishRule::DoubleOut);
        assert!(single.busted);
        assert!(!single.finished);

        let outer_bull = apply_throw(25, Segment::OuterBull, FinishRule::DoubleOut);
        assert!(outer_bull.busted);
    }

    #[test]
    fn single_out_finishes_on_anything() {
        let outcome = apply_throw(20, Segment::Single(20), FinishRule::SingleOut);
        assert!(outcome.finished);
        assert_eq!(outcome.new_score, 0);
    }

    #[test]
    fn leaving_one_busts_under_double_out_only() {
        assert!(apply_throw(21, Segment::Single(20), FinishRule::DoubleOut).busted);
        let single_out = apply_throw(21, Segment::Single(20), FinishRule::SingleOut);
        assert!(!single_out.busted);
        assert_eq!(single_out.new_score, 1);
    }

    #[test]
    fn bust_discards_whole_turn() {
        let outcome = replay_turn(
            70,
            [Segment::Triple(20), Segment::Double(6), Segment::Single(1)],
            FinishRule::DoubleOut,
        );
        assert!(outcome.busted);
        assert_eq!(outcome.total_scored, 0);
        assert_eq!(outcome.end_score, 70);
        assert_eq!(outcome.darts_used, 2);
    }

    #[test]
    fn replay_stops_on_finish() {
        let outcome = replay_turn(
            100,
            [Segment::Triple(20), Segment::Double(20), Segment::Single(5)],
            FinishRule::DoubleOut,
        );
        assert!(outcome.finished);
        assert_eq!(outcome.total_scored, 100);
        assert_eq!(outcome.darts_used, 2);
    }

    #[test]
    fn replay_accumulates_open_turn() {
        let outcome = replay_turn(
            501,
            [Segment::Triple(20), Segment::Triple(20), Segment::Triple(20)],
            FinishRule::DoubleOut,
        );
        assert_eq!(outcome.total_scored, 180);
        assert_eq!(outcome.end_score, 321);
        assert!(!outcome.busted && !outcome.finished);
    }

    #[test]
    fn remaining_score_floors_at_zero() {
        assert_eq!(remaining_score(501, [180, 140]), 181);
        assert_eq!(remaining_score(60, [50, 40]), 0);
    }

    #[test]
    fn starting_score_rejects_unknown_values() {
        assert_eq!(StartingScore::try_from(501), Ok(StartingScore::S501));
        assert!(StartingScore::try_from(500).is_err());
    }
}
