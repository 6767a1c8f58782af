//! Dartboard geometry and the mapping from raw hits to scored segments.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Sector numbers in clockwise order starting with the sector at the top of the board.
pub const SECTOR_ORDER: [u8; 20] = [
    20, 1, 18, 4, 13, 6, 10, 15, 2, 17, 3, 19, 7, 16, 8, 11, 14, 9, 12, 5,
];

const SECTOR_DEGREES: f64 = 18.0;
const OUTER_BULL_SCORE: u32 = 25;
const INNER_BULL_SCORE: u32 = 50;

/// Ring family of a scored segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Miss,
    Single,
    Double,
    Triple,
    OuterBull,
    InnerBull,
}

/// A single scored area of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Segment {
    /// Dart landed outside the scoring area (or bounced out).
    Miss,
    /// Single ring of a numbered sector.
    Single(u8),
    /// Double ring of a numbered sector.
    Double(u8),
    /// Triple ring of a numbered sector.
    Triple(u8),
    /// Outer bull, worth 25.
    OuterBull,
    /// Inner bull (bullseye), worth 50 and counting as a double for finishing.
    InnerBull,
}

impl Segment {
    /// Ring family of the segment.
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Miss => SegmentKind::Miss,
            Segment::Single(_) => SegmentKind::Single,
            Segment::Double(_) => SegmentKind::Double,
            Segment::Triple(_) => SegmentKind::Triple,
            Segment::OuterBull => SegmentKind::OuterBull,
            Segment::InnerBull => SegmentKind::InnerBull,
        }
    }

    /// Sector number for numbered segments.
    pub fn number(&self) -> Option<u8> {
        match self {
            Segment::Single(n) | Segment::Double(n) | Segment::Triple(n) => Some(*n),
            _ => None,
        }
    }

    /// Points awarded for the segment.
    pub fn scored(&self) -> u32 {
        match self {
            Segment::Miss => 0,
            Segment::Single(n) => u32::from(*n),
            Segment::Double(n) => u32::from(*n) * 2,
            Segment::Triple(n) => u32::from(*n) * 3,
            Segment::OuterBull => OUTER_BULL_SCORE,
            Segment::InnerBull => INNER_BULL_SCORE,
        }
    }

    /// Whether the segment may end a leg under double-out.
    pub fn is_double_out_finisher(&self) -> bool {
        matches!(self, Segment::Double(_) | Segment::InnerBull)
    }

    /// Short label used in storage and on the wire (`T20`, `D16`, `SB`, `DB`, `Miss`).
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Expand into the resolver output shape.
    pub fn to_result(self) -> SegmentResult {
        SegmentResult {
            kind: self.kind(),
            value: self.number(),
            scored: self.scored(),
            label: self.label(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Miss => f.write_str("Miss"),
            Segment::Single(n) => write!(f, "S{n}"),
            Segment::Double(n) => write!(f, "D{n}"),
            Segment::Triple(n) => write!(f, "T{n}"),
            Segment::OuterBull => f.write_str("SB"),
            Segment::InnerBull => f.write_str("DB"),
        }
    }
}

/// Raised when a stored label does not name a board segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown segment label `{0}`")]
pub struct InvalidSegmentLabel(pub String);

impl FromStr for Segment {
    type Err = InvalidSegmentLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed {
            "Miss" | "miss" | "MISS" => return Ok(Segment::Miss),
            "SB" => return Ok(Segment::OuterBull),
            "DB" => return Ok(Segment::InnerBull),
            _ => {}
        }

        let invalid = || InvalidSegmentLabel(value.to_owned());
        let mut chars = trimmed.chars();
        let prefix = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty()
            || digits.len() > 2
            || digits.starts_with('0')
            || !digits.bytes().all(|byte| byte.is_ascii_digit())
        {
            return Err(invalid());
        }
        let number: u8 = digits.parse().map_err(|_| invalid())?;
        if !(1..=20).contains(&number) {
            return Err(invalid());
        }

        match prefix {
            'S' => Ok(Segment::Single(number)),
            'D' => Ok(Segment::Double(number)),
            'T' => Ok(Segment::Triple(number)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Segment {
    type Error = InvalidSegmentLabel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Segment> for String {
    fn from(value: Segment) -> Self {
        value.to_string()
    }
}

/// Resolver output describing a hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SegmentResult {
    pub kind: SegmentKind,
    /// Sector number, absent for bulls and misses.
    pub value: Option<u8>,
    pub scored: u32,
    pub label: String,
}

/// Ring multiplier picked in the scoring UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Single,
    Double,
    Triple,
}

/// Discrete hit chosen from the scoring UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Modifier applied to a sector number.
    Numbered { modifier: Modifier, number: u8 },
    /// Outer (`inner = false`) or inner bull.
    Bull { inner: bool },
    Miss,
}

/// Concentric ring radii, expressed in projection units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardRadii {
    pub inner_bull: f64,
    pub outer_bull: f64,
    pub triple_inner: f64,
    pub triple_outer: f64,
    pub double_inner: f64,
    pub double_outer: f64,
}

impl Default for BoardRadii {
    fn default() -> Self {
        // Regulation board dimensions in millimetres.
        Self {
            inner_bull: 6.35,
            outer_bull: 15.9,
            triple_inner: 99.0,
            triple_outer: 107.0,
            double_inner: 162.0,
            double_outer: 170.0,
        }
    }
}

/// Canonical board projection used to interpret pixel hits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardGeometry {
    pub center_x: f64,
    pub center_y: f64,
    pub radii: BoardRadii,
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self {
            center_x: 200.0,
            center_y: 200.0,
            radii: BoardRadii::default(),
        }
    }
}

impl BoardGeometry {
    /// Resolve a hit given in projection coordinates (y grows downwards).
    ///
    /// Every input resolves to a segment: anything beyond the outer double wire,
    /// including non-finite coordinates, is a miss.
    pub fn resolve_point(&self, x: f64, y: f64) -> Segment {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let radius = dx.hypot(dy);
        let radii = &self.radii;

        if !radius.is_finite() || radius > radii.double_outer {
            return Segment::Miss;
        }
        if radius <= radii.inner_bull {
            return Segment::InnerBull;
        }
        if radius <= radii.outer_bull {
            return Segment::OuterBull;
        }

        let number = SECTOR_ORDER[sector_index(dx, dy)];
        if radius >= radii.double_inner {
            Segment::Double(number)
        } else if (radii.triple_inner..=radii.triple_outer).contains(&radius) {
            Segment::Triple(number)
        } else {
            Segment::Single(number)
        }
    }
}

/// Sector index (0 = top) for an offset from the board centre.
fn sector_index(dx: f64, dy: f64) -> usize {
    // Sector 0 is centred on -90 degrees, so shift by half a sector before bucketing.
    let angle = dy.atan2(dx).to_degrees();
    let shifted = (angle + 90.0 + SECTOR_DEGREES / 2.0).rem_euclid(360.0);
    ((shifted / SECTOR_DEGREES) as usize) % SECTOR_ORDER.len()
}

/// Resolve a discrete UI selection. Sector numbers outside 1..=20 resolve to a miss.
pub fn resolve_selection(selection: Selection) -> Segment {
    match selection {
        Selection::Miss => Segment::Miss,
        Selection::Bull { inner: true } => Segment::InnerBull,
        Selection::Bull { inner: false } => Segment::OuterBull,
        Selection::Numbered { number, .. } if !(1..=20).contains(&number) => Segment::Miss,
        Selection::Numbered { modifier, number } => match modifier {
            Modifier::Single => Segment::Single(number),
            Modifier::Double => Segment::Double(number),
            Modifier::Triple => Segment::Triple(number),
        },
    }
}
