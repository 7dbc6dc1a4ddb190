//! Property-based tests: random placement/injection/tick sequences must
//! preserve the structural invariants of the network.

use beltworks_core::direction::{Direction, Side, TilePos, DIRECTIONS};
use beltworks_core::engine::Engine;
use beltworks_core::fixed::Fixed64;
use beltworks_core::id::{ItemTypeId, NodeId};
use beltworks_core::node::JunctionConfig;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// One step of a random build-and-run session on a small grid.
#[derive(Debug, Clone)]
enum Op {
    PlaceBelt { x: i32, y: i32, dir: u8 },
    PlaceJunction { x: i32, y: i32 },
    Inject { nth_belt: usize, side: u8, kind: u32 },
    Step,
}

fn arb_op(grid: i32) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..grid, 0..grid, 0..4u8).prop_map(|(x, y, dir)| Op::PlaceBelt { x, y, dir }),
        1 => (0..grid, 0..grid).prop_map(|(x, y)| Op::PlaceJunction { x, y }),
        2 => (0..64usize, 0..2u8, 0..4u32)
            .prop_map(|(nth_belt, side, kind)| Op::Inject { nth_belt, side, kind }),
        4 => Just(Op::Step),
    ]
}

fn arb_session(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(arb_op(8), 1..=max_ops)
}

/// Apply a session, returning the engine and how many injections succeeded.
fn run_session(ops: &[Op]) -> (Engine, usize) {
    let mut engine = Engine::new();
    let mut belts: Vec<NodeId> = Vec::new();
    let mut injected = 0;

    for op in ops {
        match *op {
            Op::PlaceBelt { x, y, dir } => {
                let direction = DIRECTIONS[dir as usize];
                if let Ok(id) = engine.place_belt(TilePos::new(x, y), direction) {
                    belts.push(id);
                }
            }
            Op::PlaceJunction { x, y } => {
                let _ = engine.place_junction(TilePos::new(x, y), JunctionConfig::default());
            }
            Op::Inject { nth_belt, side, kind } => {
                if belts.is_empty() {
                    continue;
                }
                let target = belts[nth_belt % belts.len()];
                let side = if side == 0 { Side::Left } else { Side::Right };
                if engine.inject_item(target, side, ItemTypeId(kind)) {
                    injected += 1;
                }
            }
            Op::Step => engine.step(),
        }
    }
    (engine, injected)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every gap on every side stays non-negative, whatever gets built.
    #[test]
    fn gaps_never_negative(ops in arb_session(120)) {
        let (engine, _) = run_session(&ops);
        for (_, line) in engine.registry.iter() {
            for side in &line.sides {
                for item in &side.items {
                    prop_assert!(item.gap >= Fixed64::ZERO);
                }
            }
        }
    }

    /// Line membership is a bijection: every belt's line contains it exactly
    /// once, and every member points back at its line.
    #[test]
    fn membership_is_a_bijection(ops in arb_session(120)) {
        let (engine, _) = run_session(&ops);

        for (node_id, node) in engine.world.iter() {
            if !node.is_belt() {
                continue;
            }
            let line_id = node.line();
            prop_assert!(line_id.is_some(), "placed belt left unassigned");
            let line = engine.registry.line(line_id.unwrap());
            prop_assert!(line.is_some(), "belt points at a dead line");
            let occurrences = line
                .unwrap()
                .members
                .iter()
                .filter(|&&m| m == node_id)
                .count();
            prop_assert_eq!(occurrences, 1);
        }

        for (line_id, line) in engine.registry.iter() {
            prop_assert!(!line.members.is_empty(), "registry holds an empty line");
            for &member in &line.members {
                let node = engine.world.node(member);
                prop_assert!(node.is_some());
                prop_assert_eq!(node.unwrap().line(), Some(line_id));
            }
        }
    }

    /// Members form a contiguous output-to-input chain from start to end.
    #[test]
    fn members_form_contiguous_chain(ops in arb_session(120)) {
        let (engine, _) = run_session(&ops);
        for (_, line) in engine.registry.iter() {
            let first = engine.world.node(line.members[0]).unwrap();
            prop_assert_eq!(first.position, line.start);
            let last = engine.world.node(*line.members.last().unwrap()).unwrap();
            prop_assert_eq!(last.position, line.end);

            for pair in line.members.windows(2) {
                let from = engine.world.node(pair[0]).unwrap();
                let to = engine.world.node(pair[1]).unwrap();
                prop_assert_eq!(
                    from.position.step(from.direction),
                    to.position,
                    "consecutive members must be output-to-input adjacent"
                );
            }
        }
    }

    /// With no loaders in the network, nothing destroys items: the total
    /// count always equals the number of successful injections.
    #[test]
    fn items_conserved(ops in arb_session(120)) {
        let (engine, injected) = run_session(&ops);
        prop_assert_eq!(engine.total_items(), injected);
    }

    /// Identical sessions produce identical state hashes.
    #[test]
    fn sessions_are_deterministic(ops in arb_session(80)) {
        let (engine_a, _) = run_session(&ops);
        let (engine_b, _) = run_session(&ops);
        prop_assert_eq!(engine_a.state_hash(), engine_b.state_hash());
    }

    /// Snapshot round-trips preserve state and future behavior.
    #[test]
    fn snapshot_round_trip(ops in arb_session(80), extra_ticks in 0..40usize) {
        let (mut engine, _) = run_session(&ops);
        let data = engine.serialize().expect("serialize should succeed");
        let mut restored = Engine::deserialize(&data).expect("deserialize should succeed");
        prop_assert_eq!(engine.state_hash(), restored.state_hash());

        for _ in 0..extra_ticks {
            engine.step();
            restored.step();
        }
        prop_assert_eq!(engine.state_hash(), restored.state_hash());
    }

    /// The per-side cursor always lies within [0, len].
    #[test]
    fn cursor_stays_in_bounds(ops in arb_session(120)) {
        let (engine, _) = run_session(&ops);
        for (_, line) in engine.registry.iter() {
            for side in &line.sides {
                prop_assert!(side.first_not_stuck <= side.items.len());
            }
        }
    }
}
