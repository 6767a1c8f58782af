use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        checkout::{CheckoutQuery, CheckoutResponse},
        segments::ResolveSegmentRequest,
    },
    scoring::SegmentResult,
    services::board_service,
    state::SharedState,
};

/// Stateless scoring helpers.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/checkout", get(checkout))
        .route("/segments/resolve", post(resolve_segment))
}

/// Suggest finishing routes for a remaining score.
#[utoipa::path(
    get,
    path = "/checkout",
    tag = "board",
    params(CheckoutQuery),
    responses(
        (status = 200, description = "Finishing routes, fewest darts first", body = CheckoutResponse),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn checkout(Valid(Query(query)): Valid<Query<CheckoutQuery>>) -> Json<CheckoutResponse> {
    Json(board_service::checkout(query))
}

/// Resolve a hit to a board segment without recording it.
#[utoipa::path(
    post,
    path = "/segments/resolve",
    tag = "board",
    request_body = ResolveSegmentRequest,
    responses(
        (status = 200, description = "Resolved segment", body = SegmentResult),
        (status = 400, description = "Invalid hit")
    )
)]
pub async fn resolve_segment(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ResolveSegmentRequest>>,
) -> Json<SegmentResult> {
    Json(board_service::resolve_segment(&state, payload))
}
