//! Beltworks Core -- the conveyor-network simulation engine.
//!
//! This crate maintains a dynamic topology of connected belt segments
//! ("lines"), resolves how each segment curves from its neighbors, advances
//! items along lines with a compact gap encoding, and runs the capacity-
//! and delay-gated buffering of junction and router nodes.
//!
//! # Placement and Tick Pipelines
//!
//! Placing a node through [`engine::Engine`] runs synchronously:
//!
//! 1. **Curve resolve** -- the placed belt and every belt it feeds.
//! 2. **Registry update** -- singleton creation, merge, or split, with
//!    downstream propagation until the network is consistent.
//! 3. **Path rebuild** -- rails and lengths for every touched line.
//!
//! Each call to [`engine::Engine::step`] then advances one tick: the flow
//! phase (at the configured stride), the loader/unloader lane phase, and
//! the junction/router buffer phase.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- placement API, tick pipeline, the push contract.
//! - [`registry::LineRegistry`] -- arena of lines; merge/split machinery.
//! - [`line::Line`] / [`line::LineSide`] -- gap-encoded item rails.
//! - [`curve::Curve`] -- per-belt bend state derived from neighbors.
//! - [`path`] -- rail geometry built from curve sequences.
//! - [`buffer::BufferState`] -- junction/router queues, loader lanes.
//! - [`serialize`] -- versioned binary snapshots via bitcode.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point for deterministic distances.
//!
//! # Invariants
//!
//! Items on a side never pass or overlap each other: every gap stays
//! non-negative, and only push acceptance moves an item across a boundary.
//! Rejected pushes are silent and drive backpressure upstream.

pub mod buffer;
pub mod curve;
pub mod direction;
pub mod engine;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod line;
pub mod node;
pub mod path;
pub mod registry;
pub mod serialize;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
