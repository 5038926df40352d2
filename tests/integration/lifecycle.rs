//! Storage and query state across many structural changes
//!
//! A cached query must keep agreeing with a brute-force scan of the world.

use std::collections::HashSet;

use proptest::prelude::*;
use quarry::prelude::*;

struct A(u8);
struct B;
struct C;

#[derive(Debug, Clone)]
enum Op {
    Spawn(u8),
    Despawn(usize),
    ToggleB(usize),
    ToggleC(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Spawn),
        any::<usize>().prop_map(Op::Despawn),
        any::<usize>().prop_map(Op::ToggleB),
        any::<usize>().prop_map(Op::ToggleC),
    ]
}

fn pick(i: usize, live: &[Entity]) -> Option<Entity> {
    (!live.is_empty()).then(|| live[i % live.len()])
}

fn run(world: &mut World, live: &mut Vec<Entity>, op: &Op) {
    match op {
        Op::Spawn(v) => live.push(world.spawn((A(*v),)).unwrap()),
        Op::Despawn(i) => {
            if let Some(e) = pick(*i, live) {
                world.despawn(e).unwrap();
                live.retain(|x| *x != e);
            }
        }
        Op::ToggleB(i) => {
            if let Some(e) = pick(*i, live) {
                if world.has::<B>(e) {
                    world.remove::<B>(e).unwrap();
                } else {
                    world.insert(e, B).unwrap();
                }
            }
        }
        Op::ToggleC(i) => {
            if let Some(e) = pick(*i, live) {
                if world.has::<C>(e) {
                    world.remove::<C>(e).unwrap();
                } else {
                    world.insert(e, C).unwrap();
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn cached_query_agrees_with_scan(ops in prop::collection::vec(op(), 1..80)) {
        let mut world = World::new();
        let mut live = Vec::new();
        let mut query = world.query_filtered::<(Entity, &A), (With<B>, Without<C>)>().unwrap();

        for op in &ops {
            run(&mut world, &mut live, op);

            let cached: HashSet<_> = query.iter(&world).map(|(e, _)| e).collect();
            let scanned: HashSet<_> = live
                .iter()
                .copied()
                .filter(|e| world.has::<B>(*e) && !world.has::<C>(*e))
                .collect();
            prop_assert_eq!(cached, scanned);
        }

        prop_assert_eq!(world.entity_count(), live.len());
        for e in &live {
            prop_assert!(world.get::<A>(*e).is_ok());
        }
    }
}

#[test]
fn values_survive_round_trips_between_archetypes() {
    let mut world = World::new();
    let entities: Vec<_> = (0..=255u8).map(|v| world.spawn((A(v),)).unwrap()).collect();

    for e in entities.iter().step_by(2) {
        world.insert(*e, B).unwrap();
    }
    for e in entities.iter().step_by(3) {
        world.insert(*e, C).unwrap();
    }
    for e in entities.iter().step_by(2) {
        world.remove::<B>(*e).unwrap();
    }

    for (v, e) in (0..=255u8).zip(&entities) {
        assert_eq!(world.get::<A>(*e).unwrap().0, v);
        assert!(!world.has::<B>(*e));
        assert_eq!(world.has::<C>(*e), v % 3 == 0);
    }
}
