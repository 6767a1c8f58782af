use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the dart scoring backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::create_match,
        crate::routes::matches::list_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::end_match,
        crate::routes::matches::reorder_players,
        crate::routes::matches::add_player,
        crate::routes::matches::remove_player,
        crate::routes::legs::get_leg,
        crate::routes::legs::record_throw,
        crate::routes::legs::recompute_leg,
        crate::routes::legs::edit_throw,
        crate::routes::legs::delete_throw,
        crate::routes::board::checkout,
        crate::routes::board::resolve_segment,
        crate::routes::sse::changes_stream,
        crate::routes::sse::leg_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::ReorderPlayersRequest,
            crate::dto::matches::AddPlayerRequest,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::MatchListItem,
            crate::dto::matches::SeatSummary,
            crate::dto::matches::LegsWon,
            crate::dto::legs::LegSummary,
            crate::dto::legs::LegView,
            crate::dto::legs::TurnSummary,
            crate::dto::legs::PlayerRemaining,
            crate::dto::legs::RecomputeResponse,
            crate::dto::throws::HitInput,
            crate::dto::throws::RecordThrowRequest,
            crate::dto::throws::EditThrowRequest,
            crate::dto::throws::ThrowSummary,
            crate::dto::throws::ThrowOutcomeSummary,
            crate::dto::throws::ThrowRecorded,
            crate::dto::throws::ThrowChangeResponse,
            crate::dto::checkout::CheckoutQuery,
            crate::dto::checkout::CheckoutResponse,
            crate::dto::segments::ResolveSegmentRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::LegSnapshotEvent,
            crate::dto::sse::TurnCompletedEvent,
            crate::scoring::SegmentResult,
            crate::scoring::SegmentKind,
            crate::scoring::FinishRule,
            crate::scoring::segment::Modifier,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Match lifecycle and play order"),
        (name = "legs", description = "Scoreboards, darts and corrections"),
        (name = "board", description = "Checkout suggestions and segment resolution"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
