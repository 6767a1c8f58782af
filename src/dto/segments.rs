use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::throws::HitInput;

/// Hit to resolve against the configured board.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ResolveSegmentRequest {
    #[validate(nested)]
    pub hit: HitInput,
}
