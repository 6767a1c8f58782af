use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    dao::models::{LegEntity, MatchEntity},
    scoring::realtime::{RowChange, ThrowRow, TurnRow},
};

/// Match row as published on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRow {
    pub id: Uuid,
    pub legs_to_win: u32,
    pub winner_player_id: Option<Uuid>,
    pub ended_early: bool,
    pub completed: bool,
}

impl From<&MatchEntity> for MatchRow {
    fn from(value: &MatchEntity) -> Self {
        Self {
            id: value.id,
            legs_to_win: value.legs_to_win,
            winner_player_id: value.winner_player_id,
            ended_early: value.ended_early,
            completed: value.completed_at.is_some(),
        }
    }
}

/// Leg row as published on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegRow {
    pub id: Uuid,
    pub match_id: Uuid,
    pub leg_number: u32,
    pub starting_player_id: Uuid,
    pub winner_player_id: Option<Uuid>,
}

impl From<&LegEntity> for LegRow {
    fn from(value: &LegEntity) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            leg_number: value.leg_number,
            starting_player_id: value.starting_player_id,
            winner_player_id: value.winner_player_id,
        }
    }
}

/// A row change tagged with the table it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum RowChangeEvent {
    Matches(RowChange<MatchRow>),
    Legs(RowChange<LegRow>),
    Turns(RowChange<TurnRow>),
    Throws(RowChange<ThrowRow>),
}

impl RowChangeEvent {
    /// Name of the table the change belongs to, used as the SSE event name.
    pub fn table(&self) -> &'static str {
        match self {
            RowChangeEvent::Matches(_) => "matches",
            RowChangeEvent::Legs(_) => "legs",
            RowChangeEvent::Turns(_) => "turns",
            RowChangeEvent::Throws(_) => "throws",
        }
    }

    /// Leg the changed row belongs to, if it belongs to one that is known.
    pub fn leg_id(&self) -> Option<Uuid> {
        match self {
            RowChangeEvent::Matches(_) => None,
            RowChangeEvent::Legs(change) => change.row().map(|row| row.id),
            RowChangeEvent::Turns(change) => change.row().map(|row| row.leg_id),
            RowChangeEvent::Throws(change) => change.row().and_then(|row| row.leg_id),
        }
    }
}

/// Broadcast hub fanning row changes out to every subscribed stream.
pub struct ChangeHub {
    sender: broadcast::Sender<RowChangeEvent>,
}

impl ChangeHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RowChangeEvent> {
        self.sender.subscribe()
    }

    /// Streams currently listening for changes.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send a change to all current subscribers, ignoring the no-subscriber case.
    pub fn publish(&self, event: RowChangeEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::realtime::ChangeType;

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let hub = ChangeHub::new(4);
        let mut receiver = hub.subscribe();
        let row = TurnRow {
            id: Uuid::new_v4(),
            leg_id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
            turn_number: 1,
            total_scored: 0,
            busted: false,
        };

        hub.publish(RowChangeEvent::Turns(RowChange {
            event_type: ChangeType::Insert,
            new: Some(row.clone()),
            old: None,
            commit_timestamp: None,
        }));

        let event = receiver.recv().await.expect("event delivered");
        assert_eq!(event.table(), "turns");
        let RowChangeEvent::Turns(change) = event else {
            panic!("unexpected table");
        };
        assert_eq!(change.new, Some(row));
    }

    #[test]
    fn events_serialise_with_their_table_tag() {
        let event = RowChangeEvent::Throws(RowChange {
            event_type: ChangeType::Delete,
            new: None,
            old: Some(ThrowRow {
                id: Uuid::nil(),
                turn_id: Uuid::nil(),
                leg_id: None,
                dart_index: 2,
                segment: "T20".into(),
                scored: Some(60),
            }),
            commit_timestamp: None,
        });

        let json = serde_json::to_value(&event).expect("serialisable");
        assert_eq!(json["table"], "throws");
        assert_eq!(json["event_type"], "DELETE");
        assert_eq!(json["old"]["segment"], "T20");
    }
}
