use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, LegSnapshotEvent, ServerEvent, SystemStatus, TurnCompletedEvent},
    error::ServiceError,
    scoring::realtime::{Effects, SpectatorState, apply_throw_change, apply_turn_change},
    services::leg_service::LegSnapshot,
    state::{RowChangeEvent, SharedState},
};

type EventSender = mpsc::Sender<Result<Event, Infallible>>;

/// Stream every row change as it is published, one SSE event per change named
/// after its table.
pub fn changes_stream(state: SharedState) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.changes().subscribe();
    let mut degraded = state.degraded_watcher();
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let handshake = Handshake {
            stream: "changes".into(),
            degraded: *degraded.borrow_and_update(),
        };
        if !send(&tx, ServerEvent::json("handshake".to_owned(), &handshake)).await {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = SystemStatus { degraded: *degraded.borrow_and_update() };
                    if !send(&tx, ServerEvent::json("system_status".to_owned(), &status)).await {
                        break;
                    }
                }
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(change) => {
                            let payload = ServerEvent::json(change.table().to_owned(), &change);
                            if !send(&tx, payload).await {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "change stream lagging; dropped changes");
                        }
                    }
                }
            }
        }

        info!("change stream disconnected");
    });

    to_sse(rx)
}

/// Stream the spectator view of `leg_id`.
///
/// Sends a `leg.snapshot` on connect, folds every turn and throw change of the
/// leg into the view (changes of other legs are dropped unseen), and re-sends the snapshot whenever it moves. A
/// `turn.completed` event precedes the snapshot when a turn closes. Missing
/// parent rows and lagged receivers trigger a refetch from storage.
pub async fn leg_stream(
    state: SharedState,
    leg_id: Uuid,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let store = state.require_score_store().await?;
    let snapshot = LegSnapshot::load(&store, leg_id).await?;
    let mut spectator = SpectatorState::for_leg(leg_id, snapshot.spectator_turns());
    let mut receiver = state.changes().subscribe();
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let handshake = Handshake {
            stream: "leg".into(),
            degraded: state.is_degraded().await,
        };
        if !send(&tx, ServerEvent::json("handshake".to_owned(), &handshake)).await
            || !send_snapshot(&tx, leg_id, &spectator).await
        {
            return;
        }

        loop {
            let before = spectator.turns.clone();
            let effects = tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(change) if change.leg_id() != Some(leg_id) => continue,
                        Ok(RowChangeEvent::Turns(change)) => {
                            spectator.apply(apply_turn_change(&change, &spectator))
                        }
                        Ok(RowChangeEvent::Throws(change)) => {
                            spectator.apply(apply_throw_change(&change, &spectator))
                        }
                        Ok(_) => continue,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(%leg_id, skipped, "leg stream lagging; refetching");
                            Effects {
                                needs_reconcile: true,
                                completed_turn_id: None,
                            }
                        }
                    }
                }
            };

            if effects.needs_reconcile {
                match refetch(&state, leg_id).await {
                    Ok(fresh) => spectator = fresh,
                    Err(err) => warn!(%leg_id, error = %err, "could not refetch leg"),
                }
            }

            if let Some(turn_id) = effects.completed_turn_id {
                let completed = TurnCompletedEvent { leg_id, turn_id };
                if !send(&tx, ServerEvent::json("turn.completed".to_owned(), &completed)).await {
                    break;
                }
            }

            let moved = effects.needs_reconcile
                || effects.completed_turn_id.is_some()
                || before != spectator.turns;
            if moved && !send_snapshot(&tx, leg_id, &spectator).await {
                break;
            }
        }

        info!(%leg_id, "leg stream disconnected");
    });

    Ok(to_sse(rx))
}

async fn refetch(state: &SharedState, leg_id: Uuid) -> Result<SpectatorState, ServiceError> {
    let store = state.require_score_store().await?;
    let snapshot = LegSnapshot::load(&store, leg_id).await?;
    debug!(%leg_id, turns = snapshot.turns.len(), "refetched leg for spectators");
    Ok(SpectatorState::for_leg(leg_id, snapshot.spectator_turns()))
}

async fn send_snapshot(tx: &EventSender, leg_id: Uuid, spectator: &SpectatorState) -> bool {
    let snapshot = LegSnapshotEvent::from_state(leg_id, spectator);
    send(tx, ServerEvent::json("leg.snapshot".to_owned(), &snapshot)).await
}

/// Push a serialised event to the response; `false` once the client is gone.
async fn send(tx: &EventSender, payload: serde_json::Result<ServerEvent>) -> bool {
    match payload {
        Ok(payload) => {
            let mut event = Event::default().data(payload.data);
            if let Some(name) = payload.event {
                event = event.event(name);
            }
            tx.send(Ok(event)).await.is_ok()
        }
        Err(err) => {
            warn!(error = %err, "failed to serialise SSE payload");
            true
        }
    }
}

fn to_sse(
    rx: mpsc::Receiver<Result<Event, Infallible>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
