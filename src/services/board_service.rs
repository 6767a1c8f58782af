use tracing::debug;

use crate::{
    dto::{
        checkout::{CheckoutQuery, CheckoutResponse, route_labels},
        segments::ResolveSegmentRequest,
    },
    scoring::{SegmentResult, checkout::compute_checkout_suggestions},
    state::SharedState,
};

/// Finishing routes for a remaining score.
pub fn checkout(query: CheckoutQuery) -> CheckoutResponse {
    let routes = compute_checkout_suggestions(query.remaining, query.darts_left, query.finish_rule);
    debug!(
        remaining = query.remaining,
        darts_left = query.darts_left,
        routes = routes.len(),
        "computed checkout suggestions"
    );
    CheckoutResponse {
        remaining: query.remaining,
        darts_left: query.darts_left,
        finish_rule: query.finish_rule,
        suggestions: route_labels(&routes),
    }
}

/// Resolve a hit against the configured board without recording it.
pub fn resolve_segment(state: &SharedState, request: ResolveSegmentRequest) -> SegmentResult {
    request.hit.resolve(&state.config().board).to_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dto::throws::HitInput, scoring::FinishRule, state::AppState};

    #[test]
    fn checkout_lists_the_classic_170() {
        let response = checkout(CheckoutQuery {
            remaining: 170,
            darts_left: 3,
            finish_rule: FinishRule::DoubleOut,
        });
        assert_eq!(response.suggestions, vec![vec!["T20", "T20", "DB"]]);
    }

    #[test]
    fn checkout_is_empty_for_bogey_numbers() {
        let response = checkout(CheckoutQuery {
            remaining: 169,
            darts_left: 3,
            finish_rule: FinishRule::DoubleOut,
        });
        assert!(response.suggestions.is_empty());
    }

    #[tokio::test]
    async fn resolves_the_bullseye_from_coordinates() {
        let state = AppState::new(AppConfig::default());
        let result = resolve_segment(
            &state,
            ResolveSegmentRequest {
                hit: HitInput::Coordinates { x: 200.0, y: 200.0 },
            },
        );
        assert_eq!(result.scored, 50);
        assert_eq!(result.label, "DB");
    }
}
