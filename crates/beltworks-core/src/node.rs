//! Network nodes and their output-port capability.
//!
//! Every node is one of five concrete kinds -- belt, loader, unloader,
//! router, junction -- held in a closed tagged variant. The system uses
//! **enum dispatch** (not trait objects): sized inline storage, predictable
//! branching, and exhaustive matches at every capability site.
//!
//! A node's *output ports* are the directions it can emit items toward,
//! per covered tile. Belts and unloaders emit forward from their single
//! tile; junctions emit in all four directions; routers emit outward from
//! every perimeter tile of their footprint; loaders emit nothing onto the
//! grid (they feed a storage collaborator instead).

use crate::curve::Curve;
use crate::direction::{Direction, TilePos, DIRECTIONS};
use crate::fixed::Ticks;
use crate::id::LineId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Per-kind configuration
// ---------------------------------------------------------------------------

/// Configuration for a junction node: a capacity- and delay-gated
/// straight-through buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionConfig {
    /// Maximum queued items per (travel direction, side) queue.
    pub capacity: usize,
    /// Transit delay in ticks before a queued item may leave.
    pub delay: Ticks,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            delay: 30,
        }
    }
}

/// Configuration for a router node: a multi-tile buffer that distributes
/// items round-robin over its whole perimeter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Maximum queued items per side queue.
    pub capacity: usize,
    /// Transit delay in ticks before a queued item may leave.
    pub delay: Ticks,
    /// Edge length of the square footprint, in tiles.
    pub size: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            delay: 30,
            size: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// The concrete kind of a network node, with per-kind topology state.
///
/// Runtime buffering state (queues, lanes, round-robin cursors) lives in
/// [`crate::buffer::BufferState`], keyed by the same `NodeId`; this enum
/// carries only what the curve resolver and line registry read and write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A conveyor segment. Curve state and line membership are assigned by
    /// the curve resolver and line registry respectively.
    Belt { curve: Curve, line: Option<LineId> },
    /// Accepts items from directly behind and feeds a storage collaborator.
    Loader,
    /// Pulls items from a storage collaborator and feeds the node it faces.
    Unloader,
    /// Straight-through delay buffer, one queue pair per travel direction.
    Junction(JunctionConfig),
    /// Perimeter-distributing delay buffer, possibly multi-tile.
    Router(RouterConfig),
}

/// A placed network node: position, forward direction, kind.
///
/// `position` is the top-left tile for multi-tile nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub position: TilePos,
    pub direction: Direction,
    pub kind: NodeKind,
}

impl Node {
    pub fn belt(position: TilePos, direction: Direction) -> Self {
        Self {
            position,
            direction,
            kind: NodeKind::Belt {
                curve: Curve::Straight,
                line: None,
            },
        }
    }

    pub fn loader(position: TilePos, direction: Direction) -> Self {
        Self {
            position,
            direction,
            kind: NodeKind::Loader,
        }
    }

    pub fn unloader(position: TilePos, direction: Direction) -> Self {
        Self {
            position,
            direction,
            kind: NodeKind::Unloader,
        }
    }

    pub fn junction(position: TilePos, config: JunctionConfig) -> Self {
        Self {
            position,
            direction: Direction::Right,
            kind: NodeKind::Junction(config),
        }
    }

    pub fn router(position: TilePos, config: RouterConfig) -> Self {
        Self {
            position,
            direction: Direction::Right,
            kind: NodeKind::Router(config),
        }
    }

    /// Edge length of the footprint in tiles (1 for everything but routers).
    pub fn size(&self) -> u32 {
        match &self.kind {
            NodeKind::Router(config) => config.size,
            _ => 1,
        }
    }

    /// Every tile this node occupies, row by row.
    pub fn footprint(&self) -> impl Iterator<Item = TilePos> + '_ {
        let size = self.size() as i32;
        let origin = self.position;
        (0..size).flat_map(move |dy| {
            (0..size).map(move |dx| TilePos::new(origin.x + dx, origin.y + dy))
        })
    }

    /// Whether `tile` lies inside this node's footprint.
    pub fn covers(&self, tile: TilePos) -> bool {
        let size = self.size() as i32;
        tile.x >= self.position.x
            && tile.x < self.position.x + size
            && tile.y >= self.position.y
            && tile.y < self.position.y + size
    }

    /// Output-port directions from one covered tile.
    pub fn output_ports(&self, tile: TilePos) -> Vec<Direction> {
        debug_assert!(self.covers(tile), "output_ports on uncovered tile");
        match &self.kind {
            NodeKind::Belt { .. } | NodeKind::Unloader => vec![self.direction],
            NodeKind::Loader => Vec::new(),
            NodeKind::Junction(_) => DIRECTIONS.to_vec(),
            NodeKind::Router(_) => DIRECTIONS
                .iter()
                .copied()
                .filter(|d| !self.covers(tile.step(*d)))
                .collect(),
        }
    }

    /// Every `(tile, direction)` output slot, footprint row by row. A
    /// multi-tile router enumerates its whole perimeter, keyed by the exact
    /// edge tile.
    pub fn output_slots(&self) -> Vec<(TilePos, Direction)> {
        let tiles: Vec<TilePos> = self.footprint().collect();
        let mut slots = Vec::new();
        for tile in tiles {
            for direction in self.output_ports(tile) {
                slots.push((tile, direction));
            }
        }
        slots
    }

    /// The belt's line membership, if this node is a belt.
    pub fn line(&self) -> Option<LineId> {
        match &self.kind {
            NodeKind::Belt { line, .. } => *line,
            _ => None,
        }
    }

    /// The belt's curve state. Non-belts are always straight.
    pub fn curve(&self) -> Curve {
        match &self.kind {
            NodeKind::Belt { curve, .. } => *curve,
            _ => Curve::Straight,
        }
    }

    pub fn is_belt(&self) -> bool {
        matches!(self.kind, NodeKind::Belt { .. })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
