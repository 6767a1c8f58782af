use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::matches::{
        AddPlayerRequest, CreateMatchRequest, MatchListItem, MatchSummary, ReorderPlayersRequest,
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Match lifecycle and play-order endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/end", post(end_match))
        .route("/matches/{id}/players", post(add_player))
        .route("/matches/{id}/players/order", put(reorder_players))
        .route("/matches/{id}/players/{player_id}", delete(remove_player))
}

/// Start a new match and its first leg.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = MatchSummary),
        (status = 400, description = "Invalid match settings or roster"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<(StatusCode, Json<MatchSummary>), AppError> {
    let summary = match_service::create_match(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// List every match, oldest first.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    responses((status = 200, description = "Known matches", body = [MatchListItem]))
)]
pub async fn list_matches(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchListItem>>, AppError> {
    Ok(Json(match_service::list_matches(&state).await?))
}

#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match", body = MatchSummary),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::get_match(&state, id).await?))
}

/// Stop a match before anyone reached the target number of legs.
#[utoipa::path(
    post,
    path = "/matches/{id}/end",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match ended", body = MatchSummary),
        (status = 409, description = "Match already finished")
    )
)]
pub async fn end_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::end_match(&state, id).await?))
}

/// Replace the play order during the first round.
#[utoipa::path(
    put,
    path = "/matches/{id}/players/order",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    request_body = ReorderPlayersRequest,
    responses(
        (status = 200, description = "Play order updated", body = MatchSummary),
        (status = 409, description = "First round already completed")
    )
)]
pub async fn reorder_players(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ReorderPlayersRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::reorder_players(&state, id, payload).await?))
}

/// Seat another player at the end of the rotation.
#[utoipa::path(
    post,
    path = "/matches/{id}/players",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    request_body = AddPlayerRequest,
    responses(
        (status = 200, description = "Player added", body = MatchSummary),
        (status = 409, description = "First round already completed")
    )
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddPlayerRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::add_player(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/matches/{id}/players/{player_id}",
    tag = "matches",
    params(
        ("id" = Uuid, Path, description = "Identifier of the match"),
        ("player_id" = Uuid, Path, description = "Player to remove")
    ),
    responses(
        (status = 200, description = "Player removed", body = MatchSummary),
        (status = 409, description = "Player already threw or is the last one seated")
    )
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(
        match_service::remove_player(&state, id, player_id).await?,
    ))
}
