//! Integration tests for hierarchy helpers
//!
//! Tests parent/child links built through the world and through commands.

use quarry_engine::{CommandBuffer, Hierarchy, HierarchyExt, Parent, QueryExt, With};
use quarry_foundation::{Entity, ErrorKind};
use quarry_storage::World;

struct Node(u32);

fn chain(world: &mut World, length: u32) -> Vec<Entity> {
    let nodes: Vec<_> = (0..length).map(|i| world.spawn((Node(i),)).unwrap()).collect();
    for pair in nodes.windows(2) {
        world.set_parent(pair[1], pair[0]).unwrap();
    }
    nodes
}

#[test]
fn parent_is_an_ordinary_component() {
    let mut world = World::new();
    let nodes = chain(&mut world, 3);

    let mut children = world.query_filtered::<&Parent, With<Node>>().unwrap();
    assert_eq!(children.count(&world), 2);
    assert_eq!(world.get::<Parent>(nodes[2]).unwrap(), &Parent(nodes[1]));
}

#[test]
fn long_chain_rejects_closing_the_loop() {
    let mut world = World::new();
    let nodes = chain(&mut world, 20);

    let err = world.set_parent(nodes[0], nodes[19]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::HierarchyCycle { .. }));
    assert_eq!(world.parent(nodes[0]), None);
}

#[test]
fn despawn_recursive_clears_the_chain() {
    let mut world = World::new();
    let nodes = chain(&mut world, 10);
    let bystander = world.spawn((Node(99),)).unwrap();

    assert_eq!(world.despawn_recursive(nodes[3]).unwrap(), 7);

    assert!(nodes[..3].iter().all(|e| world.is_alive(*e)));
    assert!(nodes[3..].iter().all(|e| !world.is_alive(*e)));
    assert!(world.children(nodes[2]).is_empty());
    assert!(world.is_alive(bystander));
    assert_eq!(world.get::<Node>(bystander).unwrap().0, 99);
}

#[test]
fn add_child_command_links_existing_entities() {
    let mut world = World::new();
    let parent = world.spawn((Node(0),)).unwrap();
    let child = world.spawn((Node(1),)).unwrap();

    let mut buffer = CommandBuffer::new();
    buffer.record_add_child(parent, child);
    buffer.record_add_child(child, parent);
    let report = buffer.apply(&mut world);

    assert_eq!(report.applied, 1);
    assert!(matches!(
        report.failures[0].error.kind,
        ErrorKind::HierarchyCycle { .. }
    ));
    assert_eq!(world.children(parent), vec![child]);
}

#[test]
fn churn_does_not_grow_the_index() {
    let mut world = World::new();
    let mut last_child = None;

    for i in 0..1000 {
        let parent = world.spawn((Node(i),)).unwrap();
        let child = world.spawn((Node(i),)).unwrap();
        world.set_parent(child, parent).unwrap();
        world.despawn(parent).unwrap();
        assert_eq!(world.parent(child), None);
        world.despawn(child).unwrap();
        last_child = Some(child);
    }

    let entries = |world: &World| world.get_resource::<Hierarchy>().map_or(0, Hierarchy::len);
    assert!(entries(&world) <= 1);
    world.prune_hierarchy();
    assert_eq!(entries(&world), 0);
    assert_eq!(world.entity_count(), 0);
    assert!(world.children(last_child.unwrap()).is_empty());
}

#[test]
fn orphan_keeps_its_data_but_reports_no_parent() {
    let mut world = World::new();
    let nodes = chain(&mut world, 3);

    world.despawn(nodes[1]).unwrap();

    assert_eq!(world.parent(nodes[2]), None);
    assert_eq!(world.get::<Node>(nodes[2]).unwrap().0, 2);
    world.set_parent(nodes[2], nodes[0]).unwrap();
    assert_eq!(world.children(nodes[0]), vec![nodes[2]]);
}
