//! The curve resolver.
//!
//! A belt's bend is derived entirely from its neighbors: exactly one
//! qualifying input that is not directly behind the belt makes it curve
//! toward that input. Everything else -- no inputs, an input from straight
//! behind, or several competing inputs -- leaves the belt straight.

use crate::direction::Direction;
use crate::grid::World;
use crate::id::NodeId;
use serde::{Deserialize, Serialize};

/// A belt's bend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Curve {
    Straight,
    Left,
    Right,
}

impl Curve {
    /// The heading an item enters this node with, given the node's exit
    /// heading. A Right curve rotates heading +90° across the tile, so its
    /// entry heading is the exit heading rotated back.
    pub fn entry_heading(self, exit: Direction) -> Direction {
        match self {
            Curve::Straight => exit,
            Curve::Right => exit.rotate_ccw(),
            Curve::Left => exit.rotate_cw(),
        }
    }

    /// Apply this curve to an entry heading, producing the exit heading.
    pub fn apply(self, entry: Direction) -> Direction {
        match self {
            Curve::Straight => entry,
            Curve::Right => entry.rotate_cw(),
            Curve::Left => entry.rotate_ccw(),
        }
    }
}

/// Resolve the curve of a belt from its current neighbors.
///
/// Qualifying inputs are neighbors whose output ports point back at the
/// node, excluding the node's own forward direction. A single input at the
/// forward direction rotated +90° bends Right, at −90° bends Left; an input
/// from directly behind, or an ambiguous input set, resolves straight.
pub fn resolve_curve(world: &World, id: NodeId) -> Curve {
    let Some(node) = world.node(id) else {
        return Curve::Straight;
    };
    if !node.is_belt() {
        return Curve::Straight;
    }

    let inputs = world.input_bearings(id);
    if let [bearing] = inputs[..] {
        if bearing == node.direction.rotate_cw() {
            return Curve::Right;
        }
        if bearing == node.direction.rotate_ccw() {
            return Curve::Left;
        }
    }
    Curve::Straight
}

// ===========================================================================
// Tests
// ===========================================================================
