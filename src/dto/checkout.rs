use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::scoring::{FinishRule, Segment, checkout::Route};

const fn default_darts_left() -> u32 {
    3
}

const fn default_finish_rule() -> FinishRule {
    FinishRule::DoubleOut
}

/// Query parameters of `GET /checkout`.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct CheckoutQuery {
    /// Score left to check out.
    #[validate(range(max = 1000))]
    pub remaining: u32,
    /// Darts left in the turn (1-3).
    #[serde(default = "default_darts_left")]
    #[validate(range(min = 1, max = 3))]
    pub darts_left: u32,
    #[serde(default = "default_finish_rule")]
    pub finish_rule: FinishRule,
}

/// Suggested finishing routes, fewest darts first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub remaining: u32,
    pub darts_left: u32,
    pub finish_rule: FinishRule,
    /// Each route is a list of segment labels, e.g. `["T20", "T20", "DB"]`.
    pub suggestions: Vec<Vec<String>>,
}

/// Render routes as label sequences.
pub fn route_labels(routes: &[Route]) -> Vec<Vec<String>> {
    routes
        .iter()
        .map(|route| route.iter().map(Segment::label).collect())
        .collect()
}
