//! The conveyor-network engine: placement pipeline and tick pipeline.
//!
//! # Placement pipeline
//!
//! Placing a node runs synchronously, before any further tick:
//!
//! 1. **Curve resolve** -- the placed belt and every belt it feeds get
//!    their curves recomputed; a changed curve rebuilds its line's rails.
//! 2. **Registry update** -- the topology state machine creates, merges or
//!    splits lines and propagates downstream.
//!
//! # Tick pipeline
//!
//! Each [`Engine::step`] runs three phases and then bookkeeping:
//!
//! 1. **Flow** -- advance items on every line (at the configured stride)
//!    and hand exit-distance overshoot across boundaries via the push
//!    contract.
//! 2. **Lanes** -- loaders drain into their sinks, unloaders pull from
//!    their sources and feed the node they face.
//! 3. **Buffers** -- junctions pass released items straight through;
//!    routers distribute them round-robin over their perimeter.
//!
//! Push rejections are expected and silent: they drive backpressure.

use crate::buffer::{birth_tick, is_released, BufferState, ItemSink, ItemSource, TimedItem};
use crate::curve::resolve_curve;
use crate::direction::{Direction, Side, TilePos, DIRECTIONS, SIDES};
use crate::fixed::Fixed64;
use crate::grid::{PlacementError, World};
use crate::id::{ItemTypeId, LineId, NodeId};
use crate::line::ExitAttempt;
use crate::node::{JunctionConfig, Node, NodeKind, RouterConfig};
use crate::registry::LineRegistry;
use crate::sim::{FlowConfig, SimState, StateHash};
use log::trace;
use slotmap::SecondaryMap;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Main simulation engine: world grid, line registry, buffer states, and
/// the storage collaborators attached at runtime (never serialized).
pub struct Engine {
    pub world: World,
    pub registry: LineRegistry,
    pub buffers: SecondaryMap<NodeId, BufferState>,
    pub sim_state: SimState,
    pub flow: FlowConfig,
    pub(crate) sinks: SecondaryMap<NodeId, Box<dyn ItemSink>>,
    pub(crate) sources: SecondaryMap<NodeId, Box<dyn ItemSource>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("world", &self.world)
            .field("registry", &self.registry)
            .field("buffers", &self.buffers)
            .field("sim_state", &self.sim_state)
            .field("flow", &self.flow)
            .field("sinks", &format_args!("<{} sinks>", self.sinks.len()))
            .field("sources", &format_args!("<{} sources>", self.sources.len()))
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_flow(FlowConfig::default())
    }

    pub fn with_flow(flow: FlowConfig) -> Self {
        Self {
            world: World::new(),
            registry: LineRegistry::new(),
            buffers: SecondaryMap::new(),
            sim_state: SimState::new(),
            flow,
            sinks: SecondaryMap::new(),
            sources: SecondaryMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    pub fn place_belt(
        &mut self,
        position: TilePos,
        direction: Direction,
    ) -> Result<NodeId, PlacementError> {
        self.place(Node::belt(position, direction))
    }

    pub fn place_loader(
        &mut self,
        position: TilePos,
        direction: Direction,
    ) -> Result<NodeId, PlacementError> {
        self.place(Node::loader(position, direction))
    }

    pub fn place_unloader(
        &mut self,
        position: TilePos,
        direction: Direction,
    ) -> Result<NodeId, PlacementError> {
        self.place(Node::unloader(position, direction))
    }

    pub fn place_junction(
        &mut self,
        position: TilePos,
        config: JunctionConfig,
    ) -> Result<NodeId, PlacementError> {
        self.place(Node::junction(position, config))
    }

    pub fn place_router(
        &mut self,
        position: TilePos,
        config: RouterConfig,
    ) -> Result<NodeId, PlacementError> {
        self.place(Node::router(position, config))
    }

    fn place(&mut self, node: Node) -> Result<NodeId, PlacementError> {
        let id = self.world.insert(node)?;
        self.after_placement(id);
        Ok(id)
    }

    /// Curve resolution, then the registry state machine -- all before the
    /// next tick can interleave.
    fn after_placement(&mut self, id: NodeId) {
        if let Some(node) = self.world.node(id) {
            if let Some(state) = BufferState::new_for(&node.kind) {
                self.buffers.insert(id, state);
            }
        }
        let is_belt = self.world.node(id).is_some_and(Node::is_belt);
        if is_belt {
            self.refresh_curve(id);
        }
        let targets = self.world.output_targets(id);
        for &target in &targets {
            self.refresh_curve(target);
        }
        if is_belt {
            self.registry.update_entity(&mut self.world, id);
        }
        for target in targets {
            self.registry.update_entity(&mut self.world, target);
        }
    }

    /// Re-resolve one belt's curve; a change rebuilds its line's rails.
    fn refresh_curve(&mut self, id: NodeId) {
        let resolved = resolve_curve(&self.world, id);
        let Some(node) = self.world.node_mut(id) else {
            return;
        };
        let NodeKind::Belt { curve, line } = &mut node.kind else {
            return;
        };
        if *curve == resolved {
            return;
        }
        *curve = resolved;
        let line = *line;
        if let Some(line) = line {
            self.registry.rebuild_geometry(&self.world, line);
        }
    }

    // -----------------------------------------------------------------------
    // Storage collaborators
    // -----------------------------------------------------------------------

    /// Attach the sink a loader delivers into. Runtime-only, not persisted.
    pub fn attach_sink(&mut self, id: NodeId, sink: Box<dyn ItemSink>) {
        self.sinks.insert(id, sink);
    }

    /// Attach the source an unloader pulls from. Runtime-only, not persisted.
    pub fn attach_source(&mut self, id: NodeId, source: Box<dyn ItemSource>) {
        self.sources.insert(id, source);
    }

    // -----------------------------------------------------------------------
    // Item injection (the external producer call)
    // -----------------------------------------------------------------------

    /// Offer an item to a node through the ordinary push contract, as if
    /// pushed from the tile behind its entry. Returns the push outcome.
    pub fn inject_item(&mut self, node: NodeId, side: Side, kind: ItemTypeId) -> bool {
        let Some(n) = self.world.node(node) else {
            return false;
        };
        let from = n.position.step(n.direction.opposite());
        self.push_item(node, kind, side, from, Fixed64::ZERO)
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        let stride = u64::from(self.flow.interval.max(1));
        if self.sim_state.tick % stride == 0 {
            self.flow_phase();
        }
        self.lane_phase();
        self.buffer_phase();
        self.sim_state.tick += 1;
    }

    // -----------------------------------------------------------------------
    // Flow phase
    // -----------------------------------------------------------------------

    fn flow_phase(&mut self) {
        let speed = self.flow.speed;
        for id in self.registry.ids() {
            for side in SIDES {
                // Retry a front item already pinned at the exit.
                let blocked = self
                    .registry
                    .line(id)
                    .and_then(|l| l.side(side).front_at_exit());
                if let Some(kind) = blocked {
                    if self.deliver_from_line(id, side, kind, Fixed64::ZERO) {
                        if let Some(line) = self.registry.line_mut(id) {
                            line.side_mut(side).confirm_exit();
                        }
                    }
                }

                // Advance the one eligible item.
                let attempt = self
                    .registry
                    .line_mut(id)
                    .and_then(|l| l.side_mut(side).advance(speed));
                if let Some(ExitAttempt { kind, overshoot }) = attempt {
                    let delivered = self.deliver_from_line(id, side, kind, overshoot);
                    if let Some(line) = self.registry.line_mut(id) {
                        if delivered {
                            line.side_mut(side).confirm_exit();
                        } else {
                            line.side_mut(side).pin_front();
                        }
                    }
                }
            }
        }
    }

    /// Offer an exiting item to whatever sits past the line's end.
    fn deliver_from_line(
        &mut self,
        id: LineId,
        side: Side,
        kind: ItemTypeId,
        overshoot: Fixed64,
    ) -> bool {
        let Some(line) = self.registry.line(id) else {
            return false;
        };
        let end = line.end;
        let exit_direction = line
            .members
            .last()
            .and_then(|&m| self.world.node(m))
            .map(|n| n.direction);
        let Some(exit_direction) = exit_direction else {
            return false;
        };
        let Some(dst) = self.world.node_at(end.step(exit_direction)) else {
            return false;
        };
        self.push_item(dst, kind, side, end, overshoot)
    }

    // -----------------------------------------------------------------------
    // The push contract
    // -----------------------------------------------------------------------

    /// Offer an item to a node, `overshoot` units past the boundary between
    /// `from` and the node. Every node kind implements the same silent
    /// boolean contract; rejection is backpressure, not failure.
    pub fn push_item(
        &mut self,
        dst: NodeId,
        kind: ItemTypeId,
        side: Side,
        from: TilePos,
        overshoot: Fixed64,
    ) -> bool {
        let Some(node) = self.world.node(dst) else {
            return false;
        };
        let position = node.position;
        let direction = node.direction;
        match &node.kind {
            NodeKind::Belt { line, .. } => {
                let Some(line_id) = *line else {
                    return false;
                };
                let Some(bearing) = position.bearing_to(from) else {
                    return false;
                };
                // Head-on pushes and mid-line side loading are rejected.
                if bearing == direction {
                    return false;
                }
                let Some(line) = self.registry.line_mut(line_id) else {
                    debug_assert!(false, "belt carries an invalid line id");
                    return false;
                };
                if line.head() != dst {
                    return false;
                }
                line.side_mut(side).accept(kind, overshoot)
            }
            NodeKind::Loader => {
                let Some(bearing) = position.bearing_to(from) else {
                    return false;
                };
                // Loaders only take items arriving from directly behind.
                if bearing != direction.opposite() {
                    return false;
                }
                match self.buffers.get_mut(dst) {
                    Some(BufferState::Loader(lanes)) => {
                        lanes.lanes[side.index()].accept(kind, overshoot)
                    }
                    _ => false,
                }
            }
            NodeKind::Unloader => false,
            NodeKind::Junction(config) => {
                let config = *config;
                let Some(travel) = from.bearing_to(position) else {
                    return false;
                };
                let now = self.sim_state.tick;
                match self.buffers.get_mut(dst) {
                    Some(BufferState::Junction(junction)) => {
                        let queue = &mut junction.queues[travel as usize][side.index()];
                        if queue.len() >= config.capacity {
                            return false;
                        }
                        queue.push_back(TimedItem {
                            kind,
                            birth: birth_tick(now, overshoot, config.delay),
                        });
                        true
                    }
                    _ => false,
                }
            }
            NodeKind::Router(config) => {
                let config = *config;
                let now = self.sim_state.tick;
                match self.buffers.get_mut(dst) {
                    Some(BufferState::Router(router)) => {
                        let queue = &mut router.queues[side.index()];
                        if queue.len() >= config.capacity {
                            return false;
                        }
                        queue.push_back(TimedItem {
                            kind,
                            birth: birth_tick(now, overshoot, config.delay),
                        });
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lane phase (loaders and unloaders)
    // -----------------------------------------------------------------------

    fn lane_phase(&mut self) {
        let speed = self.flow.speed;
        let lanes: Vec<(NodeId, bool)> = self
            .buffers
            .iter()
            .filter_map(|(id, state)| match state {
                BufferState::Loader(_) => Some((id, true)),
                BufferState::Unloader(_) => Some((id, false)),
                _ => None,
            })
            .collect();

        for (id, is_loader) in lanes {
            if is_loader {
                for side in SIDES {
                    self.loader_side(id, side, speed);
                }
            } else {
                self.pull_from_source(id);
                let target = self.world.node(id).and_then(|n| {
                    let from = n.position;
                    let dst = self.world.node_at(n.position.step(n.direction))?;
                    Some((dst, from))
                });
                for side in SIDES {
                    self.unloader_side(id, side, target, speed);
                }
            }
        }
    }

    fn loader_side(&mut self, id: NodeId, side: Side, speed: Fixed64) {
        if let Some(kind) = self.lane_front(id, side) {
            if self.deliver_to_sink(id, kind) {
                self.lane_confirm(id, side);
            }
        }
        if let Some(attempt) = self.lane_advance(id, side, speed) {
            if self.deliver_to_sink(id, attempt.kind) {
                self.lane_confirm(id, side);
            } else {
                self.lane_pin(id, side);
            }
        }
    }

    fn unloader_side(
        &mut self,
        id: NodeId,
        side: Side,
        target: Option<(NodeId, TilePos)>,
        speed: Fixed64,
    ) {
        if let Some(kind) = self.lane_front(id, side) {
            let delivered = target
                .is_some_and(|(dst, from)| self.push_item(dst, kind, side, from, Fixed64::ZERO));
            if delivered {
                self.lane_confirm(id, side);
            }
        }
        if let Some(attempt) = self.lane_advance(id, side, speed) {
            let delivered = target.is_some_and(|(dst, from)| {
                self.push_item(dst, attempt.kind, side, from, attempt.overshoot)
            });
            if delivered {
                self.lane_confirm(id, side);
            } else {
                self.lane_pin(id, side);
            }
        }
    }

    /// Pull one item per side per tick from the attached source, entry
    /// space permitting.
    fn pull_from_source(&mut self, id: NodeId) {
        let Self {
            buffers, sources, ..
        } = self;
        let Some(BufferState::Unloader(lanes)) = buffers.get_mut(id) else {
            return;
        };
        let Some(source) = sources.get_mut(id) else {
            return;
        };
        for side in SIDES {
            let lane = &mut lanes.lanes[side.index()];
            if lane.free_entry_space() < Fixed64::ZERO {
                continue;
            }
            if let Some(kind) = source.take_item() {
                let accepted = lane.accept(kind, Fixed64::ZERO);
                debug_assert!(accepted, "entry space was checked before pulling");
            }
        }
    }

    fn deliver_to_sink(&mut self, id: NodeId, kind: ItemTypeId) -> bool {
        self.sinks
            .get_mut(id)
            .is_some_and(|sink| sink.accept_item(kind))
    }

    fn lane_mut(&mut self, id: NodeId, side: Side) -> Option<&mut crate::line::LineSide> {
        match self.buffers.get_mut(id) {
            Some(BufferState::Loader(lanes)) | Some(BufferState::Unloader(lanes)) => {
                Some(&mut lanes.lanes[side.index()])
            }
            _ => None,
        }
    }

    fn lane_front(&mut self, id: NodeId, side: Side) -> Option<ItemTypeId> {
        self.lane_mut(id, side).and_then(|lane| lane.front_at_exit())
    }

    fn lane_advance(&mut self, id: NodeId, side: Side, speed: Fixed64) -> Option<ExitAttempt> {
        self.lane_mut(id, side).and_then(|lane| lane.advance(speed))
    }

    fn lane_confirm(&mut self, id: NodeId, side: Side) {
        if let Some(lane) = self.lane_mut(id, side) {
            lane.confirm_exit();
        }
    }

    fn lane_pin(&mut self, id: NodeId, side: Side) {
        if let Some(lane) = self.lane_mut(id, side) {
            lane.pin_front();
        }
    }

    // -----------------------------------------------------------------------
    // Buffer phase (junctions and routers)
    // -----------------------------------------------------------------------

    fn buffer_phase(&mut self) {
        enum Work {
            Junction(TilePos, JunctionConfig),
            Router(RouterConfig, Vec<(TilePos, Direction)>),
        }

        let work: Vec<(NodeId, Work)> = self
            .world
            .iter()
            .filter_map(|(id, node)| match &node.kind {
                NodeKind::Junction(config) => Some((id, Work::Junction(node.position, *config))),
                NodeKind::Router(config) => Some((id, Work::Router(*config, node.output_slots()))),
                _ => None,
            })
            .collect();

        for (id, work) in work {
            match work {
                Work::Junction(position, config) => self.update_junction(id, position, config),
                Work::Router(config, slots) => self.update_router(id, config, &slots),
            }
        }
    }

    /// Pass released items straight through, per travel direction and side.
    fn update_junction(&mut self, id: NodeId, position: TilePos, config: JunctionConfig) {
        let now = self.sim_state.tick;
        for travel in DIRECTIONS {
            for side in SIDES {
                loop {
                    let front = match self.buffers.get(id) {
                        Some(BufferState::Junction(j)) => {
                            j.queues[travel as usize][side.index()].front().copied()
                        }
                        _ => None,
                    };
                    let Some(item) = front else {
                        break;
                    };
                    // FIFO gate. Births are non-decreasing in insertion
                    // order, so nothing behind an unready item is ready.
                    if !is_released(&item, config.delay, now) {
                        break;
                    }
                    let delivered = self
                        .world
                        .node_at(position.step(travel))
                        .is_some_and(|dst| {
                            self.push_item(dst, item.kind, side, position, Fixed64::ZERO)
                        });
                    if !delivered {
                        break;
                    }
                    if let Some(BufferState::Junction(j)) = self.buffers.get_mut(id) {
                        j.queues[travel as usize][side.index()].pop_front();
                    }
                }
            }
        }
    }

    /// Deliver released items through the per-side round-robin cursor over
    /// the perimeter slots. The cursor advances on every attempt so no
    /// congested output starves the others.
    fn update_router(&mut self, id: NodeId, config: RouterConfig, slots: &[(TilePos, Direction)]) {
        if slots.is_empty() {
            return;
        }
        let now = self.sim_state.tick;
        for side in SIDES {
            loop {
                let front = match self.buffers.get(id) {
                    Some(BufferState::Router(r)) => r.queues[side.index()].front().copied(),
                    _ => None,
                };
                let Some(item) = front else {
                    break;
                };
                if !is_released(&item, config.delay, now) {
                    break;
                }

                let mut delivered = false;
                for _ in 0..slots.len() {
                    let cursor = match self.buffers.get(id) {
                        Some(BufferState::Router(r)) => r.clock[side.index()] % slots.len(),
                        _ => break,
                    };
                    if let Some(BufferState::Router(r)) = self.buffers.get_mut(id) {
                        r.clock[side.index()] = (cursor + 1) % slots.len();
                    }
                    let (edge, direction) = slots[cursor];
                    let Some(dst) = self.world.node_at(edge.step(direction)) else {
                        continue;
                    };
                    if self.push_item(dst, item.kind, side, edge, Fixed64::ZERO) {
                        delivered = true;
                        break;
                    }
                }

                if !delivered {
                    // Leave the item queued for retry next tick.
                    break;
                }
                if let Some(BufferState::Router(r)) = self.buffers.get_mut(id) {
                    r.queues[side.index()].pop_front();
                }
                trace!("router {id:?} delivered {:?} from side {side:?}", item.kind);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accounting
    // -----------------------------------------------------------------------

    /// Total item count across all lines and buffer nodes.
    pub fn total_items(&self) -> usize {
        let buffered: usize = self.buffers.values().map(BufferState::item_count).sum();
        self.registry.total_items() + buffered
    }

    /// Deterministic FNV-1a hash over the full simulation state, for
    /// desync detection and determinism tests.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        hash.write_u64(self.sim_state.tick);

        for (_, line) in self.registry.iter() {
            hash.write_i32(line.start.x);
            hash.write_i32(line.start.y);
            hash.write_i32(line.end.x);
            hash.write_i32(line.end.y);
            hash.write_u64(line.members.len() as u64);
            for side in &line.sides {
                hash.write_u64(side.first_not_stuck as u64);
                hash.write_u64(side.items.len() as u64);
                for item in &side.items {
                    hash.write_u32(item.kind.0);
                    hash.write_fixed64(item.gap);
                }
            }
        }

        for (_, state) in self.buffers.iter() {
            match state {
                BufferState::Junction(j) => {
                    for pair in &j.queues {
                        for queue in pair {
                            hash.write_u64(queue.len() as u64);
                            for item in queue {
                                hash.write_u32(item.kind.0);
                                hash.write_u64(item.birth);
                            }
                        }
                    }
                }
                BufferState::Router(r) => {
                    hash.write_u64(r.clock[0] as u64);
                    hash.write_u64(r.clock[1] as u64);
                    for queue in &r.queues {
                        hash.write_u64(queue.len() as u64);
                        for item in queue {
                            hash.write_u32(item.kind.0);
                            hash.write_u64(item.birth);
                        }
                    }
                }
                BufferState::Loader(lanes) | BufferState::Unloader(lanes) => {
                    for lane in &lanes.lanes {
                        hash.write_u64(lane.items.len() as u64);
                        for item in &lane.items {
                            hash.write_u32(item.kind.0);
                            hash.write_fixed64(item.gap);
                        }
                    }
                }
            }
        }

        hash.finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
