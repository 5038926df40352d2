//! Integration tests for entity storage
//!
//! Tests entity spawning, destruction, generational indices, and stale reference detection.

use quarry_foundation::ErrorKind;
use quarry_storage::World;

// =============================================================================
// Entity Spawning
// =============================================================================

#[test]
fn spawn_single_entity() {
    let mut world = World::new();
    let entity = world.spawn(()).unwrap();

    assert!(world.is_alive(entity));
    assert_eq!(world.entity_count(), 1);
}

#[test]
fn spawned_entities_have_unique_indices() {
    let mut world = World::new();
    let e1 = world.spawn_empty();
    let e2 = world.spawn_empty();
    let e3 = world.spawn_empty();

    assert_ne!(e1.index, e2.index);
    assert_ne!(e2.index, e3.index);
    assert_eq!(world.entities().collect::<Vec<_>>(), vec![e1, e2, e3]);
}

// =============================================================================
// Entity Destruction
// =============================================================================

#[test]
fn despawn_invalidates_only_that_handle() {
    let mut world = World::new();
    let e1 = world.spawn_empty();
    let e2 = world.spawn_empty();

    world.despawn(e1).unwrap();

    assert!(!world.is_alive(e1));
    assert!(world.is_alive(e2));
    assert_eq!(world.entity_count(), 1);
}

#[test]
fn despawn_twice_is_stale() {
    let mut world = World::new();
    let e = world.spawn_empty();
    world.despawn(e).unwrap();

    let err = world.despawn(e).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StaleHandle(x) if x == e));
}

// =============================================================================
// Generational Indices
// =============================================================================

#[test]
fn recycled_index_gets_greater_generation() {
    let mut world = World::new();
    let old = world.spawn_empty();
    world.despawn(old).unwrap();

    let new = world.spawn_empty();
    assert_eq!(new.index, old.index);
    assert!(new.generation > old.generation);
    assert!(!world.is_alive(old));
    assert!(world.is_alive(new));
}

#[test]
fn stale_handle_never_reaches_new_occupant() {
    let mut world = World::new();
    let old = world.spawn((7u32,)).unwrap();
    world.despawn(old).unwrap();
    let new = world.spawn((8u32,)).unwrap();

    assert!(world.get::<u32>(old).unwrap_err().is_invalid_entity());
    assert!(world.insert(old, 1u8).unwrap_err().is_invalid_entity());
    assert!(world.remove::<u32>(old).unwrap_err().is_invalid_entity());
    assert_eq!(world.get::<u32>(new).unwrap(), &8);
}

#[test]
fn many_cycles_keep_generations_increasing() {
    let mut world = World::new();
    let mut last = world.spawn_empty();
    for _ in 0..100 {
        world.despawn(last).unwrap();
        let next = world.spawn_empty();
        assert_eq!(next.index, last.index);
        assert!(next.generation > last.generation);
        last = next;
    }
    assert_eq!(world.entity_store().slot_count(), 1);
}
