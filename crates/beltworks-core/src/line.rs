//! Transport lines and their gap-encoded item rails.
//!
//! A line is a maximal contiguous chain of belts sharing one flow path. Each
//! of its two sides holds items as `(kind, gap)` pairs ordered from the
//! line's exit backward to its entry. An item's position is never stored:
//! it is the cumulative sum of gaps (plus one footprint per predecessor)
//! from the exit. The `first_not_stuck` cursor makes the per-tick advance
//! O(1) per side: decrementing the cursor item's gap moves it *and* every
//! item behind it, because trailing gaps are relative.
//!
//! Invariants: every gap >= 0; items on a side never reorder.

use crate::direction::{Direction, Side, TilePos};
use crate::fixed::Fixed64;
use crate::id::{ItemTypeId, NodeId};
use crate::path::{PathSegment, ITEM_SPACING};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One item on a rail: its kind and the free distance to whatever is ahead
/// of it (the predecessor's footprint, or the exit for the front item).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: ItemTypeId,
    pub gap: Fixed64,
}

/// An item that has reached its line's end and wants to cross the boundary.
/// `overshoot` is the distance it traveled past the exit this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitAttempt {
    pub kind: ItemTypeId,
    pub overshoot: Fixed64,
}

// ---------------------------------------------------------------------------
// LineSide
// ---------------------------------------------------------------------------

/// One rail of a line: the item queue, the movement cursor, and the rail
/// geometry. Loaders and unloaders reuse this type for their fixed-length
/// internal lanes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineSide {
    /// Items ordered from the exit backward to the entry.
    pub items: VecDeque<LineItem>,
    /// Index of the nearest-to-exit item still eligible to advance.
    /// Everything in front of it is jammed at gap zero.
    pub first_not_stuck: usize,
    /// Rail geometry. Derived from member curves; rebuilt, never persisted.
    #[serde(skip)]
    pub path: Vec<PathSegment>,
    /// Total rail length. Derived alongside `path`.
    #[serde(skip)]
    pub length: Fixed64,
}

impl LineSide {
    pub fn with_geometry(path: Vec<PathSegment>, length: Fixed64) -> Self {
        Self {
            items: VecDeque::new(),
            first_not_stuck: 0,
            path,
            length,
        }
    }

    pub fn set_geometry(&mut self, path: Vec<PathSegment>, length: Fixed64) {
        self.path = path;
        self.length = length;
    }

    /// Distance from the exit to the back edge of the rearmost footprint.
    pub fn occupied_span(&self) -> Fixed64 {
        let mut span = Fixed64::ZERO;
        for item in &self.items {
            span += item.gap + ITEM_SPACING;
        }
        span
    }

    /// Free space at the entry end of the rail. Negative when the rearmost
    /// footprint hangs over the entry.
    pub fn free_entry_space(&self) -> Fixed64 {
        self.length - self.occupied_span()
    }

    /// Offer an item at the entry, `overshoot` units past the boundary.
    ///
    /// The destination's available starting space caps how far in the item
    /// lands: its gap is the leftover free space beyond the overshoot,
    /// clamped at zero when it lands jammed against the rearmost item.
    /// Rejected when there is no room at the entry at all.
    pub fn accept(&mut self, kind: ItemTypeId, overshoot: Fixed64) -> bool {
        let free = self.free_entry_space();
        if free < Fixed64::ZERO {
            return false;
        }
        let gap = (free - overshoot).max(Fixed64::ZERO);
        self.items.push_back(LineItem { kind, gap });
        true
    }

    /// The front item's kind when it is sitting at the exit, ready to cross.
    pub fn front_at_exit(&self) -> Option<ItemTypeId> {
        self.items
            .front()
            .filter(|item| item.gap == Fixed64::ZERO)
            .map(|item| item.kind)
    }

    /// Advance the cursor item by `speed`.
    ///
    /// Returns an [`ExitAttempt`] when the front item reaches the line's
    /// end; the caller resolves delivery and then calls [`confirm_exit`]
    /// or [`pin_front`]. A non-front item that catches up joins the jammed
    /// block and hands the cursor to its follower.
    ///
    /// [`confirm_exit`]: Self::confirm_exit
    /// [`pin_front`]: Self::pin_front
    pub fn advance(&mut self, speed: Fixed64) -> Option<ExitAttempt> {
        if self.first_not_stuck >= self.items.len() {
            return None;
        }
        let i = self.first_not_stuck;
        let gap = self.items[i].gap - speed;
        if gap > Fixed64::ZERO {
            self.items[i].gap = gap;
            None
        } else if i == 0 {
            Some(ExitAttempt {
                kind: self.items[0].kind,
                overshoot: -gap,
            })
        } else {
            self.items[i].gap = Fixed64::ZERO;
            self.first_not_stuck = i + 1;
            None
        }
    }

    /// Remove the front item after a successful downstream push. The freed
    /// footprint returns to the next item's gap, and the cursor rewinds so
    /// the unjammed queue may move again.
    pub fn confirm_exit(&mut self) {
        let popped = self.items.pop_front();
        debug_assert!(popped.is_some(), "confirm_exit on empty side");
        if let Some(front) = self.items.front_mut() {
            front.gap += ITEM_SPACING;
        }
        self.first_not_stuck = 0;
    }

    /// Pin the front item at the exit after a rejected push. It becomes the
    /// blocking item; the cursor moves on so trailing items pack up behind.
    pub fn pin_front(&mut self) {
        if let Some(front) = self.items.front_mut() {
            front.gap = Fixed64::ZERO;
        }
        self.first_not_stuck = 1;
    }

    /// Exit-distance of every item, front first. Test and renderer helper.
    pub fn positions(&self) -> Vec<Fixed64> {
        let mut out = Vec::with_capacity(self.items.len());
        let mut p = Fixed64::ZERO;
        for (i, item) in self.items.iter().enumerate() {
            p += item.gap;
            if i > 0 {
                p += ITEM_SPACING;
            }
            out.push(p);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// A maximal contiguous chain of belts sharing one flow path.
///
/// `members` is ordered from the entry (head) to the exit and is exactly
/// the chain of nodes connected output-to-input; membership is a bijection
/// (each belt belongs to exactly one line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub start: TilePos,
    pub end: TilePos,
    pub entry_direction: Direction,
    pub members: Vec<NodeId>,
    pub sides: [LineSide; 2],
}

impl Line {
    pub fn side(&self, side: Side) -> &LineSide {
        &self.sides[side.index()]
    }

    pub fn side_mut(&mut self, side: Side) -> &mut LineSide {
        &mut self.sides[side.index()]
    }

    /// The head node: the only member whose line may start at its position.
    pub fn head(&self) -> NodeId {
        self.members[0]
    }

    /// Total item count across both sides.
    pub fn item_count(&self) -> usize {
        self.sides.iter().map(|s| s.items.len()).sum()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
