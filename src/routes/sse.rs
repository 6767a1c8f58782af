use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/changes",
    tag = "sse",
    responses((status = 200, description = "Row change stream; events are named after their table", content_type = "text/event-stream", body = String))
)]
/// Stream every match, leg, turn and throw change.
pub async fn changes_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New change stream connection");
    sse_service::changes_stream(state)
}

#[utoipa::path(
    get,
    path = "/sse/legs/{leg_id}",
    tag = "sse",
    params(("leg_id" = Uuid, Path, description = "Leg to follow")),
    responses(
        (status = 200, description = "Spectator stream emitting `leg.snapshot` and `turn.completed`", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown leg")
    )
)]
/// Follow a single leg as a spectator.
pub async fn leg_stream(
    State(state): State<SharedState>,
    Path(leg_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    info!(%leg_id, "New spectator connection");
    Ok(sse_service::leg_stream(state, leg_id).await?)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/changes", get(changes_stream))
        .route("/sse/legs/{leg_id}", get(leg_stream))
}
