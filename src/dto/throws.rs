use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::ThrowEntity,
    dto::{legs::TurnSummary, validation::validate_hit},
    scoring::{
        BoardGeometry, Segment, ThrowOutcome,
        segment::{Modifier, Selection, resolve_selection},
    },
};

/// A dart hit as reported by a scoring client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HitInput {
    /// Pixel coordinates over the configured board projection.
    Coordinates { x: f64, y: f64 },
    /// Modifier applied to a sector number (1-20).
    Selection { modifier: Modifier, number: u8 },
    /// Outer (`inner = false`) or inner bull.
    Bull { inner: bool },
    /// Segment label such as `T20`, `D16`, `SB`, `DB` or `Miss`.
    Label { segment: String },
    Miss,
}

impl HitInput {
    /// Resolve the hit to a segment. Labels are checked by validation beforehand;
    /// an unparsable label resolves to a miss.
    pub fn resolve(&self, board: &BoardGeometry) -> Segment {
        match self {
            HitInput::Coordinates { x, y } => board.resolve_point(*x, *y),
            HitInput::Selection { modifier, number } => resolve_selection(Selection::Numbered {
                modifier: *modifier,
                number: *number,
            }),
            HitInput::Bull { inner } => resolve_selection(Selection::Bull { inner: *inner }),
            HitInput::Label { segment } => segment.parse().unwrap_or(Segment::Miss),
            HitInput::Miss => Segment::Miss,
        }
    }
}

impl Validate for HitInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_hit(self) {
            errors.add("hit", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload recording the next dart of a leg.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct RecordThrowRequest {
    /// Client-generated id; resubmitting the same id is a no-op.
    #[serde(default)]
    pub throw_id: Option<Uuid>,
    /// Expected thrower; rejected when it is not the player on the oche.
    #[serde(default)]
    pub player_id: Option<Uuid>,
    #[validate(nested)]
    pub hit: HitInput,
}

/// Payload replacing the segment of a recorded dart.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct EditThrowRequest {
    #[validate(nested)]
    pub hit: HitInput,
}

/// A recorded dart.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThrowSummary {
    pub id: Uuid,
    pub turn_id: Uuid,
    pub dart_index: u8,
    #[schema(value_type = String, example = "T20")]
    pub segment: Segment,
    pub scored: u32,
}

impl From<&ThrowEntity> for ThrowSummary {
    fn from(value: &ThrowEntity) -> Self {
        Self {
            id: value.id,
            turn_id: value.turn_id,
            dart_index: value.dart_index,
            segment: value.segment,
            scored: value.scored,
        }
    }
}

/// Effect of a single dart on the thrower's score.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ThrowOutcomeSummary {
    pub new_score: u32,
    pub busted: bool,
    pub finished: bool,
}

impl From<ThrowOutcome> for ThrowOutcomeSummary {
    fn from(value: ThrowOutcome) -> Self {
        Self {
            new_score: value.new_score,
            busted: value.busted,
            finished: value.finished,
        }
    }
}

/// Result of recording a dart.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThrowRecorded {
    pub throw: ThrowSummary,
    /// Turn after the dart was applied.
    pub turn: TurnSummary,
    pub outcome: ThrowOutcomeSummary,
    /// Whether the submission was a replay of an already recorded throw id.
    pub duplicate: bool,
    pub leg_completed: bool,
    pub match_completed: bool,
    /// Leg started because this dart won the previous one.
    pub next_leg_id: Option<Uuid>,
    /// Player expected to throw next in the current leg.
    pub next_player_id: Option<Uuid>,
}

/// Result of editing or deleting a historical dart.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThrowChangeResponse {
    /// The edited dart; absent after a delete.
    pub throw: Option<ThrowSummary>,
    pub recompute: crate::dto::legs::RecomputeResponse,
}
