//! The world grid: node arena plus tile index.
//!
//! Nodes live in a `SlotMap` arena; a position-keyed index maps every
//! covered tile back to its node. The index is what neighbor queries walk:
//! the curve resolver and line registry never touch raw coordinates beyond
//! a single `step`.

use crate::direction::{Direction, TilePos, DIRECTIONS};
use crate::id::NodeId;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when placing a node.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("tile ({0}, {1}) is already occupied")]
    TileOccupied(i32, i32),
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The node arena and its tile index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    nodes: SlotMap<NodeId, Node>,
    tile_index: HashMap<TilePos, NodeId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, claiming every tile of its footprint.
    pub fn insert(&mut self, node: Node) -> Result<NodeId, PlacementError> {
        for tile in node.footprint() {
            if self.tile_index.contains_key(&tile) {
                return Err(PlacementError::TileOccupied(tile.x, tile.y));
            }
        }
        let tiles: Vec<TilePos> = node.footprint().collect();
        let id = self.nodes.insert(node);
        for tile in tiles {
            self.tile_index.insert(tile, id);
        }
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// The node covering `tile`, if any.
    pub fn node_at(&self, tile: TilePos) -> Option<NodeId> {
        self.tile_index.get(&tile).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    // -----------------------------------------------------------------------
    // Port queries
    // -----------------------------------------------------------------------

    /// Whether the node covering `tile` (if any) has an output port on that
    /// tile pointing in `direction`.
    pub fn outputs_toward(&self, tile: TilePos, direction: Direction) -> bool {
        let Some(id) = self.node_at(tile) else {
            return false;
        };
        let Some(node) = self.node(id) else {
            return false;
        };
        node.output_ports(tile).contains(&direction)
    }

    /// Bearings (from the node outward) of every neighbor whose output
    /// ports point back at this node, excluding the node's own forward
    /// direction.
    ///
    /// This is the shared input set consumed by both the curve resolver and
    /// the line registry's topology state machine.
    pub fn input_bearings(&self, id: NodeId) -> Vec<Direction> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        DIRECTIONS
            .iter()
            .copied()
            .filter(|&d| d != node.direction)
            .filter(|&d| {
                let tile = node.position.step(d);
                self.outputs_toward(tile, d.opposite())
            })
            .collect()
    }

    /// Every belt this node's output ports feed into, in port order.
    pub fn output_targets(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        for tile in node.footprint() {
            for direction in node.output_ports(tile) {
                let Some(neighbor) = self.node_at(tile.step(direction)) else {
                    continue;
                };
                if self.nodes[neighbor].is_belt() {
                    targets.push(neighbor);
                }
            }
        }
        targets
    }

    /// The belt directly downstream of a belt node (the one it faces).
    pub fn downstream_belt(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        let target = self.node_at(node.position.step(node.direction))?;
        self.node(target)?.is_belt().then_some(target)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
