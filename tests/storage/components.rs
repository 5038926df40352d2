//! Integration tests for component storage
//!
//! Tests insertion, removal, replacement, and moves between archetypes.

use quarry_foundation::ErrorKind;
use quarry_storage::World;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Name(String);

const ORIGIN: Position = Position { x: 0.0, y: 0.0 };
const EAST: Velocity = Velocity { dx: 1.0, dy: 0.0 };

// =============================================================================
// Insert / Remove
// =============================================================================

#[test]
fn insert_then_remove_restores_prior_values() {
    let mut world = World::new();
    let e = world.spawn((ORIGIN, Name("probe".into()))).unwrap();
    let before = world.location(e).unwrap().archetype;

    world.insert(e, EAST).unwrap();
    assert_ne!(world.location(e).unwrap().archetype, before);

    assert_eq!(world.remove::<Velocity>(e).unwrap(), EAST);
    assert_eq!(world.location(e).unwrap().archetype, before);
    assert_eq!(world.get::<Position>(e).unwrap(), &ORIGIN);
    assert_eq!(world.get::<Name>(e).unwrap(), &Name("probe".into()));
}

#[test]
fn removing_last_component_lands_in_empty_archetype() {
    let mut world = World::new();
    let e = world.spawn((EAST,)).unwrap();

    world.remove::<Velocity>(e).unwrap();

    assert!(world.entity_components(e).unwrap().is_empty());
    assert!(world.is_alive(e));
}

#[test]
fn remove_by_id_drops_the_value() {
    let mut world = World::new();
    let e = world.spawn((ORIGIN, Name("x".into()))).unwrap();
    let name = world.component_id::<Name>().unwrap();

    world.remove_by_id(e, name).unwrap();
    assert!(!world.has::<Name>(e));

    let err = world.remove_by_id(e, name).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingComponent { .. }));
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut world = World::new();
    let e = world.spawn((ORIGIN,)).unwrap();

    let err = world.insert(e, Position { x: 1.0, y: 1.0 }).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateComponent { entity, .. } if entity == e));
    assert_eq!(world.get::<Position>(e).unwrap(), &ORIGIN);
}

#[test]
fn replace_overwrites_in_place() {
    let mut world = World::new();
    let e = world.spawn((ORIGIN,)).unwrap();
    let location = world.location(e).unwrap();

    let previous = world.replace(e, Position { x: 5.0, y: 5.0 }).unwrap();

    assert_eq!(previous, Some(ORIGIN));
    assert_eq!(world.location(e).unwrap(), location);
}

// =============================================================================
// Swap-remove bookkeeping
// =============================================================================

#[test]
fn moving_first_row_relocates_last_row() {
    let mut world = World::new();
    let a = world.spawn((ORIGIN, EAST)).unwrap();
    let b = world.spawn((ORIGIN, EAST)).unwrap();
    let c = world.spawn((Position { x: 3.0, y: 3.0 }, EAST)).unwrap();

    world.remove::<Velocity>(a).unwrap();

    assert_eq!(world.location(c).unwrap().row, 0);
    assert_eq!(world.location(b).unwrap().row, 1);
    assert_eq!(world.get::<Position>(c).unwrap().x, 3.0);

    let archetype = world.archetype(world.location(c).unwrap().archetype).unwrap();
    assert_eq!(archetype.entities(), &[c, b]);
}

#[test]
fn component_values_survive_many_moves() {
    let mut world = World::new();
    let entities: Vec<_> = (0..50)
        .map(|i| {
            world
                .spawn((Position { x: i as f32, y: 0.0 }, Name(format!("e{i}"))))
                .unwrap()
        })
        .collect();

    for (i, e) in entities.iter().enumerate() {
        if i % 2 == 0 {
            world.insert(*e, EAST).unwrap();
        }
    }
    for (i, e) in entities.iter().enumerate() {
        if i % 3 == 0 {
            world.remove::<Name>(*e).unwrap();
        }
    }

    for (i, e) in entities.iter().enumerate() {
        assert_eq!(world.get::<Position>(*e).unwrap().x, i as f32);
        assert_eq!(world.has::<Velocity>(*e), i % 2 == 0);
        assert_eq!(
            world.get::<Name>(*e).ok().cloned(),
            (i % 3 != 0).then(|| Name(format!("e{i}")))
        );
    }
}
