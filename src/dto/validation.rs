//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

use crate::{dto::throws::HitInput, scoring::Segment};

/// Longest accepted player display name, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 64;

/// Validates that a hit can be resolved without guessing.
///
/// Selections must name a sector between 1 and 20, coordinates must be finite and
/// labels must name a board segment.
pub fn validate_hit(hit: &HitInput) -> Result<(), ValidationError> {
    match hit {
        HitInput::Selection { number, .. } if !(1..=20).contains(number) => {
            let mut err = ValidationError::new("sector_range");
            err.message = Some(format!("sector must be between 1 and 20 (got {number})").into());
            Err(err)
        }
        HitInput::Coordinates { x, y } if !x.is_finite() || !y.is_finite() => {
            let mut err = ValidationError::new("coordinates_finite");
            err.message = Some("coordinates must be finite numbers".into());
            Err(err)
        }
        HitInput::Label { segment } => segment.parse::<Segment>().map(|_| ()).map_err(|parse| {
            let mut err = ValidationError::new("segment_label");
            err.message = Some(parse.to_string().into());
            err
        }),
        _ => Ok(()),
    }
}

/// Validates a player display name: not blank and at most [`MAX_PLAYER_NAME_CHARS`] characters.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("player name must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message =
            Some(format!("player name must be at most {MAX_PLAYER_NAME_CHARS} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a match roster: every name valid and no name listed twice.
pub fn validate_player_names(names: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for name in names {
        validate_player_name(name)?;
        if !seen.insert(name.trim()) {
            let mut err = ValidationError::new("player_name_duplicate");
            err.message = Some(format!("player `{}` is listed twice", name.trim()).into());
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::segment::Modifier;

    #[test]
    fn test_validate_hit_sector_range() {
        let hit = |number| HitInput::Selection {
            modifier: Modifier::Double,
            number,
        };
        assert!(validate_hit(&hit(1)).is_ok());
        assert!(validate_hit(&hit(20)).is_ok());
        assert!(validate_hit(&hit(0)).is_err());
        assert!(validate_hit(&hit(21)).is_err());
    }

    #[test]
    fn test_validate_hit_label_digits() {
        let label = |segment: &str| HitInput::Label {
            segment: segment.into(),
        };
        assert!(validate_hit(&label("T20")).is_ok());
        assert!(validate_hit(&label("S+5")).is_err());
        assert!(validate_hit(&label("T020")).is_err());
    }

    #[test]
    fn test_validate_hit_coordinates() {
        assert!(validate_hit(&HitInput::Coordinates { x: 10.0, y: 5.0 }).is_ok());
        // off-board is still a valid miss
        assert!(validate_hit(&HitInput::Coordinates { x: -900.0, y: 5.0 }).is_ok());
        assert!(
            validate_hit(&HitInput::Coordinates {
                x: f64::NAN,
                y: 0.0
            })
            .is_err()
        );
    }

    #[test]
    fn test_validate_player_names() {
        assert!(validate_player_names(&["Ann".into(), "Bo".into()]).is_ok());
        assert!(validate_player_names(&["Ann".into(), " Ann ".into()]).is_err());
        assert!(validate_player_names(&["   ".into()]).is_err());
        assert!(validate_player_names(&["x".repeat(65)]).is_err());
    }
}
