//! Pure reducer folding row-change notifications into a spectator's view of a leg.
//!
//! The reducer never performs I/O. When a change references a parent row the
//! local view does not know about, it flags `needs_reconcile` and leaves the
//! state untouched so the caller can refetch instead of guessing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::x01::DARTS_PER_TURN;

/// Kind of row change carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// Row-change notification with optional before/after snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChange<T> {
    pub event_type: ChangeType,
    #[serde(default)]
    pub new: Option<T>,
    #[serde(default)]
    pub old: Option<T>,
    /// RFC 3339 commit timestamp.
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

impl<T> RowChange<T> {
    /// Row the change is about: the old snapshot for deletes, the new one otherwise.
    pub fn row(&self) -> Option<&T> {
        match self.event_type {
            ChangeType::Delete => self.old.as_ref(),
            ChangeType::Insert | ChangeType::Update => self.new.as_ref(),
        }
    }
}

/// Throw row as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowRow {
    pub id: Uuid,
    pub turn_id: Uuid,
    /// Leg of the owning turn, when the publisher knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg_id: Option<Uuid>,
    pub dart_index: u8,
    pub segment: String,
    #[serde(default)]
    pub scored: Option<u32>,
}

/// Turn row as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRow {
    pub id: Uuid,
    pub leg_id: Uuid,
    pub player_id: Uuid,
    pub turn_number: u32,
    #[serde(default)]
    pub total_scored: u32,
    #[serde(default)]
    pub busted: bool,
}

/// A dart as shown to spectators. Optimistic entries may not have an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowView {
    pub id: Option<Uuid>,
    pub dart_index: u8,
    pub segment: String,
    pub scored: u32,
}

/// A turn as shown to spectators, with its darts ordered by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub id: Uuid,
    pub leg_id: Uuid,
    pub player_id: Uuid,
    pub turn_number: u32,
    pub total_scored: u32,
    pub busted: bool,
    pub throws: Vec<ThrowView>,
}

/// Spectator snapshot of the leg currently on display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpectatorState {
    pub current_leg_id: Option<Uuid>,
    pub turns: Vec<TurnView>,
    pub turn_throw_counts: IndexMap<Uuid, usize>,
}

/// Side effects the caller should act upon after a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Effects {
    /// Local state is missing a parent row; refetch from storage.
    pub needs_reconcile: bool,
    /// Turn that just became complete, reported once per transition.
    pub completed_turn_id: Option<Uuid>,
}

/// New turn list and counts produced by a reduction, plus its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub turns: Vec<TurnView>,
    pub turn_throw_counts: IndexMap<Uuid, usize>,
    pub effects: Effects,
}

impl Reduction {
    fn unchanged(state: &SpectatorState, effects: Effects) -> Self {
        Self {
            turns: state.turns.clone(),
            turn_throw_counts: state.turn_throw_counts.clone(),
            effects,
        }
    }
}

impl SpectatorState {
    /// Snapshot for a freshly fetched leg.
    pub fn for_leg(leg_id: Uuid, turns: Vec<TurnView>) -> Self {
        let turn_throw_counts = turns
            .iter()
            .map(|turn| (turn.id, turn.throws.len()))
            .collect();
        Self {
            current_leg_id: Some(leg_id),
            turns,
            turn_throw_counts,
        }
    }

    /// Install a reduction and hand back its effects.
    pub fn apply(&mut self, reduction: Reduction) -> Effects {
        self.turns = reduction.turns;
        self.turn_throw_counts = reduction.turn_throw_counts;
        reduction.effects
    }

    fn shows_leg(&self, leg_id: Uuid) -> bool {
        self.current_leg_id == Some(leg_id)
    }
}

/// Points for a stored segment label when the row does not carry them.
///
/// Accepts `Miss`, `SB`, `DB` and `S|D|T` followed by one or two digits; anything
/// else scores zero.
pub fn fallback_scored(label: &str) -> u32 {
    match label {
        "Miss" => return 0,
        "SB" => return 25,
        "DB" => return 50,
        _ => {}
    }

    let mut chars = label.chars();
    let multiplier = match chars.next() {
        Some('S') => 1,
        Some('D') => 2,
        Some('T') => 3,
        _ => return 0,
    };
    let digits = chars.as_str();
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return 0;
    }
    digits.parse::<u32>().map_or(0, |value| value * multiplier)
}

/// Fold a throw change into `state`.
pub fn apply_throw_change(change: &RowChange<ThrowRow>, state: &SpectatorState) -> Reduction {
    let Some(row) = change.row() else {
        return Reduction::unchanged(state, Effects::default());
    };

    let Some(position) = state.turns.iter().position(|turn| turn.id == row.turn_id) else {
        return Reduction::unchanged(
            state,
            Effects {
                needs_reconcile: true,
                completed_turn_id: None,
            },
        );
    };

    if !state.shows_leg(state.turns[position].leg_id) {
        return Reduction::unchanged(state, Effects::default());
    }

    let mut turns = state.turns.clone();
    let mut turn_throw_counts = state.turn_throw_counts.clone();
    let turn = &mut turns[position];
    let previous_count = state
        .turn_throw_counts
        .get(&turn.id)
        .copied()
        .unwrap_or(turn.throws.len());

    let matches_row =
        |view: &ThrowView| view.id == Some(row.id) || view.dart_index == row.dart_index;

    match change.event_type {
        ChangeType::Insert | ChangeType::Update => {
            let view = ThrowView {
                id: Some(row.id),
                dart_index: row.dart_index,
                segment: row.segment.clone(),
                scored: row.scored.unwrap_or_else(|| fallback_scored(&row.segment)),
            };
            match turn.throws.iter().position(matches_row) {
                Some(existing) => turn.throws[existing] = view,
                None => turn.throws.push(view),
            }
            turn.throws.sort_by_key(|view| view.dart_index);
        }
        ChangeType::Delete => turn.throws.retain(|view| !matches_row(view)),
    }

    let count = turn.throws.len();
    let turn_id = turn.id;
    turn_throw_counts.insert(turn_id, count);

    let completed = previous_count < DARTS_PER_TURN && count == DARTS_PER_TURN;
    Reduction {
        turns,
        turn_throw_counts,
        effects: Effects {
            needs_reconcile: false,
            completed_turn_id: completed.then_some(turn_id),
        },
    }
}

/// Fold a turn change into `state`.
pub fn apply_turn_change(change: &RowChange<TurnRow>, state: &SpectatorState) -> Reduction {
    let Some(row) = change.row() else {
        return Reduction::unchanged(state, Effects::default());
    };
    let existing = state.turns.iter().position(|turn| turn.id == row.id);

    match change.event_type {
        ChangeType::Insert => {
            if !state.shows_leg(row.leg_id) || existing.is_some() {
                return Reduction::unchanged(state, Effects::default());
            }
            let mut reduction = Reduction::unchanged(state, Effects::default());
            reduction.turns.push(TurnView {
                id: row.id,
                leg_id: row.leg_id,
                player_id: row.player_id,
                turn_number: row.turn_number,
                total_scored: row.total_scored,
                busted: row.busted,
                throws: Vec::new(),
            });
            reduction.turn_throw_counts.insert(row.id, 0);
            reduction
        }
        ChangeType::Update => {
            let Some(position) = existing else {
                return Reduction::unchanged(
                    state,
                    Effects {
                        needs_reconcile: true,
                        completed_turn_id: None,
                    },
                );
            };

            let mut reduction = Reduction::unchanged(state, Effects::default());
            let turn = &mut reduction.turns[position];
            let newly_busted = !turn.busted && row.busted;
            let newly_scored = row.total_scored > turn.total_scored && row.total_scored > 0;

            turn.leg_id = row.leg_id;
            turn.player_id = row.player_id;
            turn.turn_number = row.turn_number;
            turn.total_scored = row.total_scored;
            turn.busted = row.busted;

            if newly_busted || newly_scored {
                reduction.effects.completed_turn_id = Some(row.id);
            }
            reduction
        }
        ChangeType::Delete => {
            let mut reduction = Reduction::unchanged(state, Effects::default());
            reduction.turns.retain(|turn| turn.id != row.id);
            reduction.turn_throw_counts.shift_remove(&row.id);
            reduction
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        leg_id: Uuid,
        turn_id: Uuid,
        state: SpectatorState,
    }

    fn fixture() -> Fixture {
        let leg_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let turn = TurnView {
            id: turn_id,
            leg_id,
            player_id: Uuid::new_v4(),
            turn_number: 1,
            total_scored: 0,
            busted: false,
            throws: Vec::new(),
        };
        Fixture {
            leg_id,
            turn_id,
            state: SpectatorState::for_leg(leg_id, vec![turn]),
        }
    }

    fn throw_insert(turn_id: Uuid, dart_index: u8, segment: &str) -> RowChange<ThrowRow> {
        RowChange {
            event_type: ChangeType::Insert,
            new: Some(ThrowRow {
                id: Uuid::new_v4(),
                turn_id,
                leg_id: None,
                dart_index,
                segment: segment.into(),
                scored: None,
            }),
            old: None,
            commit_timestamp: None,
        }
    }

    fn as_delete(change: &RowChange<ThrowRow>) -> RowChange<ThrowRow> {
        RowChange {
            event_type: ChangeType::Delete,
            new: None,
            old: change.new.clone(),
            commit_timestamp: None,
        }
    }

    #[test]
    fn fallback_parser_scores_labels() {
        assert_eq!(fallback_scored("Miss"), 0);
        assert_eq!(fallback_scored("SB"), 25);
        assert_eq!(fallback_scored("DB"), 50);
        assert_eq!(fallback_scored("T20"), 60);
        assert_eq!(fallback_scored("D7"), 14);
        assert_eq!(fallback_scored("S5"), 5);
        assert_eq!(fallback_scored("T123"), 0);
        assert_eq!(fallback_scored("X1"), 0);
        assert_eq!(fallback_scored("D"), 0);
    }

    #[test]
    fn insert_sorts_by_dart_index_and_counts() {
        let Fixture {
            turn_id, mut state, ..
        } = fixture();
        state.apply(apply_throw_change(&throw_insert(turn_id, 2, "S5"), &state));
        state.apply(apply_throw_change(&throw_insert(turn_id, 1, "T20"), &state));

        let throws = &state.turns[0].throws;
        assert_eq!(throws[0].segment, "T20");
        assert_eq!(throws[0].scored, 60);
        assert_eq!(throws[1].dart_index, 2);
        assert_eq!(state.turn_throw_counts[&turn_id], 2);
    }

    #[test]
    fn third_dart_completes_turn_once() {
        let Fixture {
            turn_id, mut state, ..
        } = fixture();
        for index in 1..=2 {
            let effects = state.apply(apply_throw_change(
                &throw_insert(turn_id, index, "S1"),
                &state,
            ));
            assert_eq!(effects.completed_turn_id, None);
        }

        let third = throw_insert(turn_id, 3, "S1");
        let effects = state.apply(apply_throw_change(&third, &state));
        assert_eq!(effects.completed_turn_id, Some(turn_id));

        // Re-delivering the same insert is an upsert and does not complete again.
        let effects = state.apply(apply_throw_change(&third, &state));
        assert_eq!(effects.completed_turn_id, None);
        assert_eq!(state.turns[0].throws.len(), 3);
    }

    #[test]
    fn unknown_turn_requests_reconcile() {
        let Fixture { state, .. } = fixture();
        let reduction = apply_throw_change(&throw_insert(Uuid::new_v4(), 1, "S1"), &state);
        assert!(reduction.effects.needs_reconcile);
        assert_eq!(reduction.turns, state.turns);
    }

    #[test]
    fn stale_leg_events_are_ignored() {
        let Fixture {
            turn_id, mut state, ..
        } = fixture();
        state.current_leg_id = Some(Uuid::new_v4());
        let reduction = apply_throw_change(&throw_insert(turn_id, 1, "S1"), &state);
        assert_eq!(reduction.effects, Effects::default());
        assert!(reduction.turns[0].throws.is_empty());
    }

    #[test]
    fn delete_after_insert_restores_throw_list() {
        let Fixture {
            turn_id, mut state, ..
        } = fixture();
        state.apply(apply_throw_change(&throw_insert(turn_id, 1, "T20"), &state));
        let before = state.turns[0].throws.clone();

        let insert = throw_insert(turn_id, 2, "D16");
        state.apply(apply_throw_change(&insert, &state));
        state.apply(apply_throw_change(&as_delete(&insert), &state));

        assert_eq!(state.turns[0].throws, before);
        assert_eq!(state.turn_throw_counts[&turn_id], 1);
    }

    #[test]
    fn reducer_is_deterministic() {
        let Fixture { turn_id, state, .. } = fixture();
        let change = throw_insert(turn_id, 1, "T19");
        assert_eq!(
            apply_throw_change(&change, &state),
            apply_throw_change(&change, &state)
        );
    }

    #[test]
    fn turn_insert_appends_shell_for_current_leg_only() {
        let Fixture {
            leg_id, mut state, ..
        } = fixture();
        let row = TurnRow {
            id: Uuid::new_v4(),
            leg_id,
            player_id: Uuid::new_v4(),
            turn_number: 2,
            total_scored: 0,
            busted: false,
        };
        let insert = RowChange {
            event_type: ChangeType::Insert,
            new: Some(row.clone()),
            old: None,
            commit_timestamp: None,
        };
        state.apply(apply_turn_change(&insert, &state));
        assert_eq!(state.turns.len(), 2);
        assert_eq!(state.turn_throw_counts[&row.id], 0);

        // Duplicate insert is a no-op.
        state.apply(apply_turn_change(&insert, &state));
        assert_eq!(state.turns.len(), 2);

        let other_leg = RowChange {
            new: Some(TurnRow {
                id: Uuid::new_v4(),
                leg_id: Uuid::new_v4(),
                ..row
            }),
            ..insert
        };
        state.apply(apply_turn_change(&other_leg, &state));
        assert_eq!(state.turns.len(), 2);
    }

    #[test]
    fn turn_update_signals_completion_on_bust_or_new_total() {
        let Fixture {
            leg_id,
            turn_id,
            mut state,
        } = fixture();
        let player_id = state.turns[0].player_id;
        let update = |total_scored, busted| RowChange {
            event_type: ChangeType::Update,
            new: Some(TurnRow {
                id: turn_id,
                leg_id,
                player_id,
                turn_number: 1,
                total_scored,
                busted,
            }),
            old: None,
            commit_timestamp: None,
        };

        let effects = state.apply(apply_turn_change(&update(45, false), &state));
        assert_eq!(effects.completed_turn_id, Some(turn_id));
        assert_eq!(state.turns[0].total_scored, 45);

        let effects = state.apply(apply_turn_change(&update(45, false), &state));
        assert_eq!(effects.completed_turn_id, None);

        let effects = state.apply(apply_turn_change(&update(0, true), &state));
        assert_eq!(effects.completed_turn_id, Some(turn_id));
    }

    #[test]
    fn turn_update_for_unknown_turn_requests_reconcile() {
        let Fixture { leg_id, state, .. } = fixture();
        let change = RowChange {
            event_type: ChangeType::Update,
            new: Some(TurnRow {
                id: Uuid::new_v4(),
                leg_id,
                player_id: Uuid::new_v4(),
                turn_number: 7,
                total_scored: 10,
                busted: false,
            }),
            old: None,
            commit_timestamp: None,
        };
        assert!(apply_turn_change(&change, &state).effects.needs_reconcile);
    }

    #[test]
    fn turn_delete_drops_turn_and_count() {
        let Fixture {
            turn_id, mut state, ..
        } = fixture();
        let old = TurnRow {
            id: turn_id,
            leg_id: state.turns[0].leg_id,
            player_id: state.turns[0].player_id,
            turn_number: 1,
            total_scored: 0,
            busted: false,
        };
        let change = RowChange {
            event_type: ChangeType::Delete,
            new: None,
            old: Some(old),
            commit_timestamp: None,
        };
        state.apply(apply_turn_change(&change, &state));
        assert!(state.turns.is_empty());
        assert!(!state.turn_throw_counts.contains_key(&turn_id));
    }
}
