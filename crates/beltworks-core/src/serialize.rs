//! Serialization and snapshot support for the engine.
//!
//! Snapshots are binary via `bitcode` with a versioned header. Rail paths
//! and lane lengths are derived state: they are skipped on encode and
//! rebuilt after decode. Malformed data fails with a descriptive error and
//! aborts the load entirely; there are no partial loads.
//!
//! Storage collaborators (sinks and sources) are runtime attachments and
//! are never part of a snapshot.

use crate::buffer::BufferState;
use crate::engine::Engine;
use crate::grid::World;
use crate::id::NodeId;
use crate::registry::LineRegistry;
use crate::sim::{FlowConfig, SimState};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a Beltworks engine snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xBE17_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("data too short for a snapshot")]
    TooShort,
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header carried by every snapshot. Enables format detection and version
/// checking before the payload is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    /// Validate the header. Returns `Ok(())` if valid.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine snapshot
// ---------------------------------------------------------------------------

/// The serializable portion of the engine. Lines round-trip as start/end,
/// member ids and side item lists; their rails are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    world: World,
    registry: LineRegistry,
    buffers: SecondaryMap<NodeId, BufferState>,
    sim_state: SimState,
    flow: FlowConfig,
}

impl Engine {
    /// Serialize the full engine state to a versioned binary snapshot.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(self.sim_state.tick),
            world: self.world.clone(),
            registry: self.registry.clone(),
            buffers: self.buffers.clone(),
            sim_state: self.sim_state.clone(),
            flow: self.flow,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Restore an engine from snapshot data, rebuilding all derived state.
    /// Storage collaborators must be re-attached by the caller.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        if data.is_empty() {
            return Err(DeserializeError::TooShort);
        }
        let snapshot: EngineSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        let EngineSnapshot {
            world,
            mut registry,
            mut buffers,
            sim_state,
            flow,
            ..
        } = snapshot;

        // Rails and lane lengths are derived, never persisted.
        for id in registry.ids() {
            registry.rebuild_geometry(&world, id);
        }
        for state in buffers.values_mut() {
            state.restore_geometry();
        }

        let mut engine = Engine::with_flow(flow);
        engine.world = world;
        engine.registry = registry;
        engine.buffers = buffers;
        engine.sim_state = sim_state;
        Ok(engine)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
