//! End-to-end movement scenario
//!
//! Three entities across three archetypes, driven through the prelude.

use quarry::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position(f32, f32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity(f32, f32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(u32);

struct Scene {
    world: World,
    e1: Entity,
    e2: Entity,
    e3: Entity,
}

fn scene() -> Scene {
    let mut world = World::new();
    let e1 = world
        .spawn((Position(0.0, 0.0), Velocity(1.0, 0.0)))
        .unwrap();
    let e2 = world.spawn((Position(5.0, 5.0),)).unwrap();
    let e3 = world
        .spawn((Position(1.0, 1.0), Velocity(0.0, 2.0), Health(100)))
        .unwrap();
    Scene { world, e1, e2, e3 }
}

fn sorted(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort();
    entities
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn position_without_health() {
    let Scene { world, e1, e2, .. } = scene();

    let mut query = world
        .query_filtered::<Entity, (With<Position>, Without<Health>)>()
        .unwrap();
    let found = sorted(query.iter(&world).collect());

    assert_eq!(found, sorted(vec![e1, e2]));
}

#[test]
fn movement_step_touches_only_movers() {
    let Scene {
        mut world,
        e1,
        e2,
        e3,
    } = scene();

    let mut movers = world.query::<(&mut Position, &Velocity)>().unwrap();
    for (p, v) in movers.iter_mut(&mut world) {
        p.0 += v.0;
        p.1 += v.1;
    }

    assert_eq!(world.get::<Position>(e1).unwrap(), &Position(1.0, 0.0));
    assert_eq!(world.get::<Position>(e2).unwrap(), &Position(5.0, 5.0));
    assert_eq!(world.get::<Position>(e3).unwrap(), &Position(1.0, 3.0));
}

#[test]
fn optional_health_reports_presence() {
    let Scene { world, e3, .. } = scene();

    let mut query = world
        .query::<(Entity, &Position, Option<&Health>)>()
        .unwrap();
    let with_health: Vec<_> = query
        .iter(&world)
        .filter_map(|(e, _, h)| h.map(|h| (e, *h)))
        .collect();

    assert_eq!(with_health, vec![(e3, Health(100))]);
}

// =============================================================================
// Structural Changes
// =============================================================================

#[test]
fn removing_velocity_leaves_others_intact() {
    let Scene {
        mut world,
        e1,
        e2,
        e3,
    } = scene();

    let removed = world.remove::<Velocity>(e1).unwrap();

    assert_eq!(removed, Velocity(1.0, 0.0));
    assert_eq!(world.get::<Position>(e1).unwrap(), &Position(0.0, 0.0));
    assert!(!world.has::<Velocity>(e1));
    assert_eq!(world.get::<Position>(e2).unwrap(), &Position(5.0, 5.0));
    assert_eq!(world.get::<Velocity>(e3).unwrap(), &Velocity(0.0, 2.0));
    assert_eq!(world.get::<Health>(e3).unwrap(), &Health(100));

    // e1 now shares e2's archetype
    assert_eq!(
        world.location(e1).unwrap().archetype,
        world.location(e2).unwrap().archetype
    );
}

#[test]
fn respawn_reuses_index_with_newer_generation() {
    let Scene {
        mut world, e1, e2, ..
    } = scene();

    world.despawn(e2).unwrap();
    let e4 = world.spawn((Position(9.0, 9.0),)).unwrap();

    assert_eq!(e4.index, e2.index);
    assert!(e4.generation > e2.generation);
    assert!(!world.is_alive(e2));
    assert!(world.get::<Position>(e2).unwrap_err().is_invalid_entity());
    assert_eq!(world.get::<Position>(e4).unwrap(), &Position(9.0, 9.0));
    assert_eq!(world.get::<Position>(e1).unwrap(), &Position(0.0, 0.0));
}

#[test]
fn resources_sit_beside_entities() {
    struct Gravity(f32);

    let Scene { mut world, .. } = scene();
    world.insert_resource(Gravity(-9.8));

    let g = world.resource::<Gravity>().unwrap().0;
    let mut query = world.query::<&mut Velocity>().unwrap();
    for v in query.iter_mut(&mut world) {
        v.1 += g;
    }

    let mut total = 0.0;
    let mut readers = world.query::<&Velocity>().unwrap();
    readers.for_each(&world, |v| total += v.1);
    assert!((total - (2.0 - 2.0 * 9.8)).abs() < 1e-4);
}
