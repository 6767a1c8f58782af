use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        legs::{LegView, RecomputeResponse},
        throws::{EditThrowRequest, RecordThrowRequest, ThrowChangeResponse, ThrowRecorded},
    },
    error::AppError,
    services::{leg_service, throw_service},
    state::SharedState,
};

/// Leg scoreboard, dart recording and correction endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/legs/{id}", get(get_leg))
        .route("/legs/{id}/throws", post(record_throw))
        .route("/legs/{id}/recompute", post(recompute_leg))
        .route("/throws/{id}", put(edit_throw).delete(delete_throw))
}

/// Scoreboard view of a leg.
#[utoipa::path(
    get,
    path = "/legs/{id}",
    tag = "legs",
    params(("id" = Uuid, Path, description = "Identifier of the leg")),
    responses(
        (status = 200, description = "Leg", body = LegView),
        (status = 404, description = "Unknown leg")
    )
)]
pub async fn get_leg(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LegView>, AppError> {
    Ok(Json(leg_service::leg_view(&state, id).await?))
}

/// Record the next dart of a leg.
#[utoipa::path(
    post,
    path = "/legs/{id}/throws",
    tag = "legs",
    params(("id" = Uuid, Path, description = "Identifier of the leg")),
    request_body = RecordThrowRequest,
    responses(
        (status = 201, description = "Dart recorded", body = ThrowRecorded),
        (status = 200, description = "Dart already recorded under this throw id", body = ThrowRecorded),
        (status = 409, description = "Leg finished, wrong player or concurrent write")
    )
)]
pub async fn record_throw(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<RecordThrowRequest>>,
) -> Result<(StatusCode, Json<ThrowRecorded>), AppError> {
    let recorded = throw_service::record_throw(&state, id, payload).await?;
    let status = if recorded.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(recorded)))
}

/// Replay the leg and rewrite cached turn totals.
#[utoipa::path(
    post,
    path = "/legs/{id}/recompute",
    tag = "legs",
    params(("id" = Uuid, Path, description = "Identifier of the leg")),
    responses(
        (status = 200, description = "Leg recomputed", body = RecomputeResponse),
        (status = 404, description = "Unknown leg")
    )
)]
pub async fn recompute_leg(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecomputeResponse>, AppError> {
    Ok(Json(leg_service::recompute_leg(&state, id).await?))
}

/// Correct the segment of a recorded dart.
#[utoipa::path(
    put,
    path = "/throws/{id}",
    tag = "legs",
    params(("id" = Uuid, Path, description = "Identifier of the dart")),
    request_body = EditThrowRequest,
    responses(
        (status = 200, description = "Dart corrected", body = ThrowChangeResponse),
        (status = 404, description = "Unknown dart")
    )
)]
pub async fn edit_throw(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<EditThrowRequest>>,
) -> Result<Json<ThrowChangeResponse>, AppError> {
    Ok(Json(throw_service::edit_throw(&state, id, payload).await?))
}

/// Remove a recorded dart.
#[utoipa::path(
    delete,
    path = "/throws/{id}",
    tag = "legs",
    params(("id" = Uuid, Path, description = "Identifier of the dart")),
    responses(
        (status = 200, description = "Dart removed", body = ThrowChangeResponse),
        (status = 404, description = "Unknown dart")
    )
)]
pub async fn delete_throw(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ThrowChangeResponse>, AppError> {
    Ok(Json(throw_service::delete_throw(&state, id).await?))
}
