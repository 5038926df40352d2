//! Integration tests for resources
//!
//! Tests singleton storage through the world.

use quarry_foundation::ErrorKind;
use quarry_storage::World;

#[derive(Debug, PartialEq)]
struct Gravity(f32);

#[derive(Debug, Default, PartialEq)]
struct Score(u32);

#[test]
fn absent_until_first_insert() {
    let mut world = World::new();
    assert!(matches!(
        world.resource::<Gravity>().unwrap_err().kind,
        ErrorKind::ResourceNotFound(_)
    ));
    assert!(world.get_resource::<Gravity>().is_none());

    world.insert_resource(Gravity(9.8));
    assert_eq!(world.resource::<Gravity>().unwrap(), &Gravity(9.8));
}

#[test]
fn reinsert_overwrites() {
    let mut world = World::new();
    world.insert_resource(Score(1));
    let previous = world.insert_resource(Score(2));

    assert_eq!(previous, Some(Score(1)));
    assert_eq!(world.resources().len(), 1);
}

#[test]
fn resources_do_not_touch_archetypes() {
    let mut world = World::new();
    world.insert_resource(Score::default());
    world.resource_mut::<Score>().unwrap().0 += 5;

    assert_eq!(world.archetype_count(), 1);
    assert_eq!(world.entity_count(), 0);
    assert_eq!(world.remove_resource::<Score>(), Some(Score(5)));
    assert!(!world.contains_resource::<Score>());
}
