use std::collections::HashSet;

use axion::ecs::borrow::BorrowTracker;
use axion::{ComponentError, EcsError, EntityError, EntityRegistry, ExecutionError, Read, Write};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Tag(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Extra(u32);

#[test]
fn add_then_get_roundtrip() {
    let registry = EntityRegistry::new();

    let entity = registry.create((Position { x: 1.0, y: 2.0 },)).unwrap();
    registry.add(entity, Velocity { dx: 3.0, dy: 4.0 }).unwrap();

    assert_eq!(
        *registry.get::<Position>(entity).unwrap(),
        Position { x: 1.0, y: 2.0 }
    );
    assert_eq!(
        *registry.get::<Velocity>(entity).unwrap(),
        Velocity { dx: 3.0, dy: 4.0 }
    );
}

#[test]
fn get_mut_writes_through() {
    let registry = EntityRegistry::new();

    let entity = registry.create((Tag(1),)).unwrap();
    registry.get_mut::<Tag>(entity).unwrap().0 = 99;

    assert_eq!(*registry.get::<Tag>(entity).unwrap(), Tag(99));
}

#[test]
fn get_succeeds_iff_archetype_contains_component() {
    let registry = EntityRegistry::new();

    let entity = registry
        .create((Position { x: 0.0, y: 0.0 }, Tag(7)))
        .unwrap();

    assert!(registry.get::<Position>(entity).is_ok());
    assert!(registry.get::<Tag>(entity).is_ok());
    assert!(matches!(
        registry.get::<Velocity>(entity),
        Err(EcsError::Component(ComponentError::MissingComponent { .. }))
    ));
}

#[test]
fn destroy_patches_swapped_row() {
    let registry = EntityRegistry::new();

    let a = registry.create((Tag(10),)).unwrap();
    let b = registry.create((Tag(20),)).unwrap();
    let c = registry.create((Tag(30),)).unwrap();

    // Destroying the first row swap-moves the last row into its place; the
    // survivors must still resolve to their own values.
    registry.destroy(a).unwrap();

    assert_eq!(*registry.get::<Tag>(b).unwrap(), Tag(20));
    assert_eq!(*registry.get::<Tag>(c).unwrap(), Tag(30));
    assert!(matches!(
        registry.get::<Tag>(a),
        Err(EcsError::Entity(EntityError::NotAlive { .. }))
    ));
}

#[test]
fn add_migrates_and_survivors_keep_rows() {
    let registry = EntityRegistry::new();

    let a = registry.create((Tag(1),)).unwrap();
    let b = registry.create((Tag(2),)).unwrap();
    let c = registry.create((Tag(3),)).unwrap();

    // Migrating the middle row out of the archetype swap-moves the last row.
    registry.add(b, Extra(42)).unwrap();

    assert_eq!(*registry.get::<Tag>(a).unwrap(), Tag(1));
    assert_eq!(*registry.get::<Tag>(b).unwrap(), Tag(2));
    assert_eq!(*registry.get::<Tag>(c).unwrap(), Tag(3));
    assert_eq!(*registry.get::<Extra>(b).unwrap(), Extra(42));
}

#[test]
fn double_add_is_rejected() {
    let registry = EntityRegistry::new();

    let entity = registry.create((Tag(1),)).unwrap();
    assert!(matches!(
        registry.add(entity, Tag(2)),
        Err(EcsError::Component(ComponentError::DuplicateComponent { .. }))
    ));
    // The original value is untouched.
    assert_eq!(*registry.get::<Tag>(entity).unwrap(), Tag(1));
}

#[test]
fn remove_absent_is_noop() {
    let registry = EntityRegistry::new();

    let entity = registry.create((Tag(1),)).unwrap();
    registry.remove::<Velocity>(entity).unwrap();
    assert_eq!(*registry.get::<Tag>(entity).unwrap(), Tag(1));
}

#[test]
fn remove_drops_component() {
    let registry = EntityRegistry::new();

    let entity = registry
        .create((Tag(5), Position { x: 1.0, y: 1.0 }))
        .unwrap();
    registry.remove::<Position>(entity).unwrap();

    assert!(registry.get::<Position>(entity).is_err());
    assert_eq!(*registry.get::<Tag>(entity).unwrap(), Tag(5));
}

#[test]
fn duplicate_bundle_component_is_rejected() {
    let registry = EntityRegistry::new();

    assert!(matches!(
        registry.create((Tag(1), Tag(2))),
        Err(EcsError::Component(ComponentError::DuplicateInBundle))
    ));
}

#[test]
fn view_exact_match_is_first() {
    let registry = EntityRegistry::new();

    // Register the view before any archetype exists.
    let view = registry.view_for::<(Position,)>().unwrap();
    assert!(registry.view_archetypes(view).unwrap().is_empty());

    let exact = registry.create((Position { x: 0.0, y: 0.0 },)).unwrap();
    registry
        .create((Position { x: 1.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();
    registry
        .create((Position { x: 2.0, y: 0.0 }, Tag(1)))
        .unwrap();

    let archetypes = registry.view_archetypes(view).unwrap();
    assert_eq!(archetypes.len(), 3);
    assert_eq!(archetypes[0], registry.archetype_of(exact).unwrap());
}

#[test]
fn view_registered_after_archetypes_sees_them() {
    let registry = EntityRegistry::new();

    let exact = registry
        .create((Velocity { dx: 1.0, dy: 1.0 },))
        .unwrap();
    registry
        .create((Velocity { dx: 2.0, dy: 2.0 }, Tag(9)))
        .unwrap();

    let view = registry.view_for::<(Velocity,)>().unwrap();
    let archetypes = registry.view_archetypes(view).unwrap();
    assert_eq!(archetypes.len(), 2);
    assert_eq!(archetypes[0], registry.archetype_of(exact).unwrap());
}

#[test]
fn iteration_visits_each_matching_entity_once() {
    let registry = EntityRegistry::new();

    let mut expected = HashSet::new();
    for i in 0..64 {
        let entity = registry
            .create((Position { x: i as f32, y: 0.0 },))
            .unwrap();
        expected.insert(entity);
    }
    for i in 0..32 {
        let entity = registry
            .create((Position { x: i as f32, y: 1.0 }, Tag(i)))
            .unwrap();
        expected.insert(entity);
    }
    // Non-matching archetype.
    registry.create((Tag(1000),)).unwrap();

    let view = registry.view_for::<(Position,)>().unwrap();
    let mut seen = HashSet::new();
    registry
        .for_each::<(Read<Position>,), _>(view, |entity, _| {
            assert!(seen.insert(entity), "entity visited twice");
        })
        .unwrap();

    assert_eq!(seen, expected);
}

#[test]
fn for_each_write_mutates_all_rows() {
    let registry = EntityRegistry::new();

    for i in 0..100 {
        registry
            .create((Position { x: i as f32, y: 0.0 }, Velocity { dx: 1.0, dy: 2.0 }))
            .unwrap();
    }

    let view = registry.view_for::<(Position, Velocity)>().unwrap();
    registry
        .for_each::<(Read<Velocity>, Write<Position>), _>(view, |_, (velocity, position)| {
            position.x += velocity.dx;
            position.y += velocity.dy;
        })
        .unwrap();

    let mut checked = 0;
    registry
        .for_each::<(Read<Position>,), _>(view, |_, (position,)| {
            assert_eq!(position.y, 2.0);
            checked += 1;
        })
        .unwrap();
    assert_eq!(checked, 100);
}

#[test]
fn column_lengths_stay_aligned_after_churn() {
    let registry = EntityRegistry::new();

    let mut entities = Vec::new();
    for i in 0..50 {
        entities.push(registry.create((Tag(i), Extra(i as u32))).unwrap());
    }
    for (i, &entity) in entities.iter().enumerate() {
        match i % 3 {
            0 => registry.destroy(entity).unwrap(),
            1 => registry.remove::<Extra>(entity).unwrap(),
            _ => registry.add(entity, Position { x: 0.0, y: 0.0 }).unwrap(),
        }
    }

    // Every surviving entity still resolves all its components; iteration
    // sees exactly the survivors.
    let view = registry.view_for::<(Tag,)>().unwrap();
    let mut count = 0;
    registry
        .for_each::<(Read<Tag>,), _>(view, |entity, (tag,)| {
            assert_eq!(*registry.get::<Tag>(entity).unwrap(), *tag);
            count += 1;
        })
        .unwrap();

    // A third of the entities were destroyed.
    assert_eq!(count, entities.len() - entities.len().div_ceil(3));
    assert_eq!(registry.circulating(), count);
}

#[test]
fn four_accessor_packs_compose() {
    let registry = EntityRegistry::new();

    for i in 0..32u64 {
        registry
            .create((
                Position { x: i as f32, y: 1.0 },
                Velocity { dx: 2.0, dy: 0.0 },
                Tag(i),
                Extra(1),
            ))
            .unwrap();
    }
    let view = registry
        .view_for::<(Position, Velocity, Tag, Extra)>()
        .unwrap();

    registry
        .for_each::<(Read<Velocity>, Read<Position>, Write<Tag>, Write<Extra>), _>(
            view,
            |_, (velocity, position, tag, extra)| {
                tag.0 += (velocity.dx + position.y) as u64;
                extra.0 += 1;
            },
        )
        .unwrap();

    let mut checked = 0;
    registry
        .for_each::<(Read<Tag>, Read<Extra>), _>(view, |_, (tag, extra)| {
            assert!(tag.0 >= 3);
            assert_eq!(extra.0, 2);
            checked += 1;
        })
        .unwrap();
    assert_eq!(checked, 32);
}

#[test]
fn duplicate_write_accessor_is_rejected() {
    let registry = EntityRegistry::new();
    // The rejection must hold even with the runtime conflict check off:
    // binding one column for both a read and a write item would alias.
    registry.set_conflict_check(false);

    registry.create((Tag(1),)).unwrap();
    let view = registry.view_for::<(Tag,)>().unwrap();

    let result = registry.for_each::<(Read<Tag>, Write<Tag>), _>(view, |_, (_tag, _mut_tag)| {});
    assert!(matches!(
        result,
        Err(EcsError::Execution(ExecutionError::AccessConflict { .. }))
    ));

    let result = registry.for_each::<(Write<Tag>, Write<Tag>), _>(view, |_, _| {});
    assert!(matches!(
        result,
        Err(EcsError::Execution(ExecutionError::AccessConflict { .. }))
    ));

    // Two reads of the same component alias only shared references.
    registry
        .for_each::<(Read<Tag>, Read<Tag>), _>(view, |_, (left, right)| {
            assert_eq!(left.0, right.0);
        })
        .unwrap();
}

#[test]
fn borrow_tracker_flags_conflicts() {
    let tracker = BorrowTracker::new(8);

    tracker.acquire_write(3).unwrap();
    assert!(tracker.acquire_read(3).is_err());
    assert!(tracker.acquire_write(3).is_err());
    tracker.release_write(3);

    tracker.acquire_read(3).unwrap();
    tracker.acquire_read(3).unwrap();
    assert!(tracker.acquire_write(3).is_err());
    tracker.release_read(3);
    tracker.release_read(3);

    tracker.acquire_write(3).unwrap();
    tracker.release_write(3);
}
