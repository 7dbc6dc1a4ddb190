//! Runtime state for buffering nodes: junctions, routers, loaders and
//! unloaders.
//!
//! Junctions and routers hold capacity-gated FIFO queues of [`TimedItem`]s.
//! An item's `birth` encodes its entry offset as extra delay, so waiting is
//! plain data: the item is released once `birth + delay <= tick`. Loaders
//! and unloaders carry a pair of fixed-length internal lanes that reuse the
//! gap-encoded [`LineSide`] mechanics wholesale.
//!
//! Variants match the buffering [`NodeKind`]s one-to-one; belts have no
//! buffer state (their items live on their line).

use crate::fixed::{Fixed64, Ticks};
use crate::id::ItemTypeId;
use crate::line::LineSide;
use crate::node::NodeKind;
use crate::path::TILE_STRAIGHT;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rail length of a loader/unloader internal lane.
pub const LANE_LENGTH: Fixed64 = TILE_STRAIGHT;

// ---------------------------------------------------------------------------
// Storage collaborators
// ---------------------------------------------------------------------------

/// Anything a loader can deliver items into (a chest, an assembler input).
/// Returning `false` refuses the item and backs pressure up the lane.
pub trait ItemSink {
    fn accept_item(&mut self, kind: ItemTypeId) -> bool;
}

/// Anything an unloader can pull items from.
pub trait ItemSource {
    fn take_item(&mut self) -> Option<ItemTypeId>;
}

// ---------------------------------------------------------------------------
// Timed items
// ---------------------------------------------------------------------------

/// An item held inside a junction or router queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedItem {
    pub kind: ItemTypeId,
    /// Tick the item notionally entered the buffer; its entry offset is
    /// folded in as extra delay.
    pub birth: Ticks,
}

/// Compute a queued item's birth tick from its entry offset: an item that
/// crossed the boundary with overshoot has already covered part of the
/// transit, so its delay shrinks proportionally (one tile is 100 units).
pub fn birth_tick(now: Ticks, overshoot: Fixed64, delay: Ticks) -> Ticks {
    let extra = overshoot * Fixed64::from_num(delay) / Fixed64::from_num(100);
    now + extra.to_num::<u64>()
}

/// Whether a queued item may leave.
pub fn is_released(item: &TimedItem, delay: Ticks, now: Ticks) -> bool {
    item.birth + delay <= now
}

// ---------------------------------------------------------------------------
// Buffer state
// ---------------------------------------------------------------------------

/// One FIFO queue pair (left/right side) of timed items.
pub type SidedQueues = [VecDeque<TimedItem>; 2];

/// Junction runtime state: one queue pair per travel direction. Items pass
/// straight through, keyed by the direction they entered moving in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionBuffer {
    pub queues: [SidedQueues; 4],
}

/// Router runtime state: one queue pair for the whole node, plus per-side
/// round-robin cursors over the perimeter output slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterBuffer {
    pub queues: SidedQueues,
    /// Per-side index of the next perimeter slot to try. Advances on every
    /// delivery attempt, successful or not.
    pub clock: [usize; 2],
}

/// Loader/unloader runtime state: two fixed-length gap-encoded lanes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanePair {
    pub lanes: [LineSide; 2],
}

impl LanePair {
    pub fn new() -> Self {
        let mut pair = Self::default();
        pair.restore_geometry();
        pair
    }

    /// Lane length is derived, not persisted; reapply it after decode.
    pub fn restore_geometry(&mut self) {
        for lane in &mut self.lanes {
            lane.set_geometry(Vec::new(), LANE_LENGTH);
        }
    }

    pub fn item_count(&self) -> usize {
        self.lanes.iter().map(|l| l.items.len()).sum()
    }
}

/// Runtime buffering state for a node, stored in a secondary map keyed by
/// `NodeId`. Variants match the buffering [`NodeKind`]s one-to-one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BufferState {
    Junction(JunctionBuffer),
    Router(RouterBuffer),
    Loader(LanePair),
    Unloader(LanePair),
}

impl BufferState {
    /// Create fresh state matching the given node kind. Belts carry none.
    pub fn new_for(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Belt { .. } => None,
            NodeKind::Loader => Some(BufferState::Loader(LanePair::new())),
            NodeKind::Unloader => Some(BufferState::Unloader(LanePair::new())),
            NodeKind::Junction(_) => Some(BufferState::Junction(JunctionBuffer::default())),
            NodeKind::Router(_) => Some(BufferState::Router(RouterBuffer::default())),
        }
    }

    /// Total queued/laned item count.
    pub fn item_count(&self) -> usize {
        match self {
            BufferState::Junction(j) => j
                .queues
                .iter()
                .flat_map(|pair| pair.iter())
                .map(VecDeque::len)
                .sum(),
            BufferState::Router(r) => r.queues.iter().map(VecDeque::len).sum(),
            BufferState::Loader(lanes) | BufferState::Unloader(lanes) => lanes.item_count(),
        }
    }

    /// Reapply derived lane geometry after decode.
    pub fn restore_geometry(&mut self) {
        if let BufferState::Loader(lanes) | BufferState::Unloader(lanes) = self {
            lanes.restore_geometry();
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
