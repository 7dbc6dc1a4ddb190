//! Shared test helpers for unit, integration and property tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the helpers
//! are available to in-module tests and, via the `test-utils` feature, to
//! the `tests/` suites.

use crate::buffer::{ItemSink, ItemSource};
use crate::direction::{Direction, TilePos};
use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::id::{ItemTypeId, NodeId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Item constructors
// ===========================================================================

pub fn plate() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn gear() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn rod() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn ore() -> ItemTypeId {
    ItemTypeId(3)
}

// ===========================================================================
// Placement helpers
// ===========================================================================

pub fn pos(x: i32, y: i32) -> TilePos {
    TilePos::new(x, y)
}

/// Place `count` belts in a straight chain from `start`, all facing
/// `direction`. Returns the node ids in chain order.
pub fn build_chain(
    engine: &mut Engine,
    start: TilePos,
    direction: Direction,
    count: usize,
) -> Vec<NodeId> {
    let mut ids = Vec::with_capacity(count);
    let mut at = start;
    for _ in 0..count {
        ids.push(engine.place_belt(at, direction).expect("tile free"));
        at = at.step(direction);
    }
    ids
}

// ===========================================================================
// Storage collaborator doubles
// ===========================================================================

/// A sink that accepts everything and records what it saw.
pub struct RecordingSink {
    pub seen: Rc<RefCell<Vec<ItemTypeId>>>,
}

impl ItemSink for RecordingSink {
    fn accept_item(&mut self, kind: ItemTypeId) -> bool {
        self.seen.borrow_mut().push(kind);
        true
    }
}

/// Create a recording sink plus a handle to inspect it afterwards.
pub fn recording_sink() -> (Box<dyn ItemSink>, Rc<RefCell<Vec<ItemTypeId>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    (
        Box::new(RecordingSink { seen: seen.clone() }),
        seen,
    )
}

/// A sink that refuses everything, for jamming loaders shut.
pub struct RejectingSink;

impl ItemSink for RejectingSink {
    fn accept_item(&mut self, _kind: ItemTypeId) -> bool {
        false
    }
}

/// A source that hands out a fixed queue of items, then runs dry.
pub struct QueueSource {
    pub items: VecDeque<ItemTypeId>,
}

impl ItemSource for QueueSource {
    fn take_item(&mut self) -> Option<ItemTypeId> {
        self.items.pop_front()
    }
}

pub fn queue_source(items: Vec<ItemTypeId>) -> Box<dyn ItemSource> {
    Box::new(QueueSource {
        items: items.into(),
    })
}
