//! The path builder.
//!
//! A line's geometry is two rail paths, one per side, produced by walking
//! the member sequence and emitting a rotated segment template per tile.
//! Each step is the member's `(curve, exit heading)` pair; a Right curve's
//! entry heading is its exit rotated −90°, a Left curve's +90°, so across a
//! consistent chain the headings accumulate exactly as items travel.
//! Straight tiles contribute one segment of equal length to both rails;
//! curved tiles contribute two half-arc segments with different lengths for
//! the inner and outer rail.
//!
//! Paths are derived state: rebuilt whenever the member sequence or any
//! member's curve changes, and never persisted.

use crate::curve::Curve;
use crate::direction::{Direction, Side};
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Distance constants (tile units; one tile is 100 units per rail)
// ---------------------------------------------------------------------------

/// Rail length across a straight tile, both sides.
pub const TILE_STRAIGHT: Fixed64 = Fixed64::from_bits(100i64 << 32);

/// Rail length across a curved tile on the inside of the bend.
pub const TILE_INNER: Fixed64 = Fixed64::from_bits(70i64 << 32);

/// Rail length across a curved tile on the outside of the bend.
pub const TILE_OUTER: Fixed64 = Fixed64::from_bits(130i64 << 32);

/// Footprint one item occupies on a rail. Gaps measure the free distance
/// beyond this footprint.
pub const ITEM_SPACING: Fixed64 = Fixed64::from_bits(10i64 << 32);

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// One straight piece of a rail path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub direction: Direction,
    pub amount: Fixed64,
}

/// Both rail paths of a line plus their total lengths, indexed by side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidePaths {
    pub segments: [Vec<PathSegment>; 2],
    pub lengths: [Fixed64; 2],
}

/// Rail length across one tile for a given side and curve.
pub fn tile_length(side: Side, curve: Curve) -> Fixed64 {
    match curve {
        Curve::Straight => TILE_STRAIGHT,
        // A right turn's right lane is the inside of the bend.
        Curve::Right => match side {
            Side::Right => TILE_INNER,
            Side::Left => TILE_OUTER,
        },
        Curve::Left => match side {
            Side::Left => TILE_INNER,
            Side::Right => TILE_OUTER,
        },
    }
}

/// Build both rails from the member sequence, one `(curve, exit heading)`
/// step per tile.
pub fn build_side_paths(steps: &[(Curve, Direction)]) -> SidePaths {
    let mut paths = SidePaths::default();

    for &(curve, exit) in steps {
        match curve {
            Curve::Straight => {
                for side in [Side::Left, Side::Right] {
                    paths.push(side, exit, TILE_STRAIGHT);
                }
            }
            _ => {
                let entry = curve.entry_heading(exit);
                for side in [Side::Left, Side::Right] {
                    let length = tile_length(side, curve);
                    let half = length / Fixed64::from_num(2);
                    // The bend is approximated by two half-arcs: one along
                    // the entry heading, one along the exit heading.
                    paths.push(side, entry, half);
                    paths.push(side, exit, length - half);
                }
            }
        }
    }

    paths
}

impl SidePaths {
    fn push(&mut self, side: Side, direction: Direction, amount: Fixed64) {
        let i = side.index();
        // Coalesce runs of straight tiles into one segment.
        if let Some(last) = self.segments[i].last_mut() {
            if last.direction == direction {
                last.amount += amount;
                self.lengths[i] += amount;
                return;
            }
        }
        self.segments[i].push(PathSegment { direction, amount });
        self.lengths[i] += amount;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
