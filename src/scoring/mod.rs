//! Pure X01 scoring core shared by the services and the spectator streams.

/// Checkout suggestions for a remaining score.
pub mod checkout;
/// Whole-leg replay used by recomputation.
pub mod leg;
/// Reducer applying row changes to spectator snapshots.
pub mod realtime;
/// Board geometry and segment resolution.
pub mod segment;
/// Single-dart and single-turn X01 rules.
pub mod x01;

pub use self::segment::{BoardGeometry, Segment, SegmentKind, SegmentResult};
pub use self::x01::{FinishRule, StartingScore, ThrowOutcome, apply_throw};
