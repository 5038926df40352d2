//! Integration tests for world structure
//!
//! Tests archetype creation, configuration, and registry behavior.

use quarry_foundation::ErrorKind;
use quarry_storage::{ArchetypeId, World, WorldConfig};

struct A;
struct B;
struct C;

#[test]
fn one_archetype_per_signature() {
    let mut world = World::new();
    world.spawn((A, B)).unwrap();
    world.spawn((B, A)).unwrap();
    world.spawn((A,)).unwrap();

    // empty, {A,B}, {A}
    assert_eq!(world.archetype_count(), 3);
    let signatures: Vec<_> = world
        .archetypes()
        .iter()
        .map(|a| a.signature().len())
        .collect();
    assert_eq!(signatures, vec![0, 2, 1]);
}

#[test]
fn archetypes_are_never_destroyed() {
    let mut world = World::new();
    let e = world.spawn((A, B, C)).unwrap();
    let count = world.archetype_count();

    world.despawn(e).unwrap();

    assert_eq!(world.archetype_count(), count);
    assert!(world.archetypes().iter().all(|a| a.is_empty()));
}

#[test]
fn archetype_columns_are_readable() {
    let mut world = World::new();
    let e1 = world.spawn((10u32, 'a')).unwrap();
    let e2 = world.spawn((20u32, 'b')).unwrap();

    let location = world.location(e1).unwrap();
    let archetype = world.archetype(location.archetype).unwrap();
    let numbers = world.component_id::<u32>().unwrap();

    assert_eq!(archetype.entities(), &[e1, e2]);
    assert_eq!(archetype.column::<u32>(numbers).unwrap(), &[10, 20]);
    assert!(archetype.column::<char>(numbers).is_none());
}

#[test]
fn empty_archetype_is_zero() {
    let mut world = World::new();
    let e = world.spawn_empty();
    assert_eq!(world.location(e).unwrap().archetype, ArchetypeId::EMPTY);
}

#[test]
fn duplicate_bundle_allocates_nothing() {
    let mut world = World::new();
    let err = world.spawn((A, B, A)).unwrap_err();

    assert!(matches!(err.kind, ErrorKind::DuplicateComponent { .. }));
    assert_eq!(world.entity_count(), 0);
    assert_eq!(world.entity_store().slot_count(), 0);
}

#[test]
fn registration_is_stable() {
    let mut world = World::new();
    let a = world.register::<A>();
    world.spawn((B, A)).unwrap();

    assert_eq!(world.register::<A>(), a);
    assert_eq!(world.registry().len(), 2);
    assert!(world.registry().info(a).unwrap().name().ends_with("A"));
}

#[test]
fn configured_world_behaves_like_default() {
    let mut world = World::with_config(WorldConfig::preallocated(1024));
    for i in 0..100u32 {
        world.spawn((i,)).unwrap();
    }
    assert_eq!(world.entity_count(), 100);
    assert_eq!(world.config().entity_capacity, 1024);
}
