use crate::{Domain, DomainConfig, EcsError, EntityId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

#[derive(Debug, Default, Clone, PartialEq)]
struct TestComponent {
    i: i32,
    c: u8,
    d: f64,
}

impl TestComponent {
    fn new(i: i32) -> Self {
        TestComponent {
            i,
            c: i as u8,
            d: i as f64,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct A(u32);
#[derive(Debug, Default, Clone, PartialEq)]
struct B(u32);
#[derive(Debug, Default, Clone, PartialEq)]
struct C(u32);
#[derive(Debug, Default, Clone, PartialEq)]
struct D(String);

/// Every live entity's signature has one bit per attached component.
fn check_signatures(domain: &Domain) {
    for entity in domain.entities() {
        let attached = [
            domain.has::<A>(entity),
            domain.has::<B>(entity),
            domain.has::<C>(entity),
            domain.has::<D>(entity),
            domain.has::<TestComponent>(entity),
        ]
        .iter()
        .filter(|has| **has)
        .count();

        let signature = domain.signature(entity).unwrap();
        assert_eq!(signature.count_ones(), attached, "entity {entity}");
        assert!(signature.size() >= domain.component_types().len());
    }
}

#[test]
fn attach_detach_round_trip() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    assert!(domain.get::<A>(entity).is_none());

    domain.attach::<A>(entity).unwrap().0 = 10;
    assert_eq!(domain.get::<A>(entity), Some(&A(10)));

    domain.get_mut::<A>(entity).unwrap().0 = 5;
    domain.commit().unwrap();
    assert_eq!(domain.get::<A>(entity), Some(&A(5)));
    assert!(domain.is_alive(entity));

    domain.detach::<A>(entity);
    // Still readable until the commit.
    assert_eq!(domain.get::<A>(entity), Some(&A(5)));

    domain.commit().unwrap();
    assert!(domain.get::<A>(entity).is_none());
    assert!(!domain.signature(entity).unwrap().get(0).unwrap());
    check_signatures(&domain);
}

#[test]
fn modify_and_delete_ninety() {
    let mut domain = Domain::new();
    let mut expected = vec![];
    let entities: Vec<EntityId> = (0..90)
        .map(|i| {
            let entity = domain.create_entity();
            *domain.attach::<TestComponent>(entity).unwrap() = TestComponent::new(i);
            expected.push(TestComponent::new(i));
            entity
        })
        .collect();
    domain.commit().unwrap();

    for (i, v) in [(1, 999), (10, 1234), (57, 350)] {
        domain.get_mut::<TestComponent>(entities[i]).unwrap().i = v;
        expected[i].i = v;
    }
    domain.commit().unwrap();

    for (entity, value) in entities.iter().zip(&expected) {
        assert_eq!(domain.get::<TestComponent>(*entity), Some(value));
    }

    domain.detach::<TestComponent>(entities[55]);
    domain.commit().unwrap();
    let check = |domain: &Domain| {
        assert!(domain.get::<TestComponent>(entities[55]).is_none());
        for (i, (entity, value)) in entities.iter().zip(&expected).enumerate() {
            if i != 55 {
                assert_eq!(domain.get::<TestComponent>(*entity), Some(value), "entity {i}");
            }
        }
        assert_eq!(domain.component_count::<TestComponent>(), 89);
    };
    check(&domain);

    domain.commit().unwrap();
    check(&domain);
    check_signatures(&domain);
}

#[test]
fn query_matches_supersets() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut domain = Domain::new();
    let mut with_a_b = BTreeSet::new();
    let mut with_b_c_d = BTreeSet::new();

    for i in 0..500 {
        let entity = domain.create_entity();
        let (a, b, c, d) = (rng.gen_bool(0.5), rng.gen_bool(0.5), rng.gen_bool(0.5), rng.gen_bool(0.3));
        if a {
            domain.attach_with(entity, A(i)).unwrap();
        }
        if b {
            domain.attach_with(entity, B(i)).unwrap();
        }
        if c {
            domain.attach_with(entity, C(i)).unwrap();
        }
        if d {
            domain.attach_with(entity, D(i.to_string())).unwrap();
        }
        if a && b {
            with_a_b.insert(entity);
        }
        if b && c && d {
            with_b_c_d.insert(entity);
        }
    }

    // Nothing is visible before the commit.
    let mut visited = 0;
    domain.for_each::<(A, B)>(|_, _| visited += 1);
    assert_eq!(visited, 0);

    domain.commit().unwrap();
    check_signatures(&domain);

    let mut found = BTreeSet::new();
    domain.for_each::<(A, B)>(|entity, (a, b)| {
        assert_eq!(a.0, b.0);
        assert!(found.insert(entity), "entity {entity} visited twice");
    });
    assert_eq!(found, with_a_b);

    let mut found = BTreeSet::new();
    domain.for_each::<(D, C, B)>(|entity, (d, c, b)| {
        assert_eq!(d.0, c.0.to_string());
        assert_eq!(b.0, c.0);
        assert!(found.insert(entity));
    });
    assert_eq!(found, with_b_c_d);
}

#[test]
fn query_mutates_components() {
    let mut domain = Domain::new();
    let entities: Vec<_> = (0..10)
        .map(|i| {
            let entity = domain.create_entity();
            domain.attach_with(entity, A(i)).unwrap();
            if i % 2 == 0 {
                domain.attach_with(entity, B(100)).unwrap();
            }
            entity
        })
        .collect();
    domain.commit().unwrap();

    domain.for_each::<(A, B)>(|_, (a, b)| a.0 += b.0);

    for (i, entity) in entities.iter().enumerate() {
        let expected = if i % 2 == 0 { i as u32 + 100 } else { i as u32 };
        assert_eq!(domain.get::<A>(*entity), Some(&A(expected)));
    }
}

#[test]
fn unregistered_types_match_nothing() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.attach::<A>(entity).unwrap();
    domain.commit().unwrap();

    let mut visited = 0;
    domain.for_each::<(A, C)>(|_, _| visited += 1);
    domain.for_each::<(C,)>(|_, _| visited += 1);
    assert_eq!(visited, 0);

    // Registered after the last commit: wider than any signature row.
    let other = domain.create_entity();
    domain.attach::<C>(other).unwrap();
    domain.for_each::<(C,)>(|_, _| visited += 1);
    assert_eq!(visited, 0);

    domain.commit().unwrap();
    domain.for_each::<(C,)>(|_, _| visited += 1);
    assert_eq!(visited, 1);
}

#[test]
#[should_panic(expected = "queried more than once")]
fn repeated_query_type_panics() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.attach::<A>(entity).unwrap();
    domain.commit().unwrap();
    domain.for_each::<(A, A)>(|_, _| {});
}

#[test]
fn duplicate_attach_fails() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.attach::<A>(entity).unwrap();

    assert!(matches!(
        domain.attach::<A>(entity),
        Err(EcsError::DuplicateComponent { entity: e, .. }) if e == entity
    ));

    domain.commit().unwrap();
    assert!(domain.attach::<A>(entity).is_err());

    domain.detach::<A>(entity);
    assert!(domain.attach::<A>(entity).is_err());

    domain.commit().unwrap();
    domain.attach_with(entity, A(3)).unwrap();
    domain.commit().unwrap();
    assert_eq!(domain.get::<A>(entity), Some(&A(3)));
}

#[test]
fn destroy_entities() {
    let mut domain = Domain::new();
    let entities: Vec<_> = (0..20)
        .map(|i| {
            let entity = domain.create_entity();
            domain.attach_with(entity, A(i)).unwrap();
            if i % 3 == 0 {
                domain.attach_with(entity, D(format!("d{i}"))).unwrap();
            }
            entity
        })
        .collect();
    domain.commit().unwrap();
    assert_eq!(domain.len(), 20);

    for &i in &[0, 7, 19, 3] {
        domain.destroy_entity(entities[i]);
        domain.destroy_entity(entities[i]);
    }
    // Destroyed at the commit only.
    assert!(domain.get::<A>(entities[7]).is_some());
    domain.commit().unwrap();

    assert_eq!(domain.len(), 16);
    assert_eq!(domain.component_count::<A>(), 16);
    assert_eq!(domain.component_count::<D>(), 5);
    check_signatures(&domain);

    for (i, entity) in entities.iter().enumerate() {
        if [0, 7, 19, 3].contains(&i) {
            assert!(!domain.is_alive(*entity));
            assert!(domain.get::<A>(*entity).is_none());
            assert!(domain.get::<D>(*entity).is_none());
            assert!(domain.signature(*entity).is_none());
        } else {
            assert_eq!(domain.get::<A>(*entity), Some(&A(i as u32)));
            assert_eq!(domain.has::<D>(*entity), i % 3 == 0);
        }
    }

    let mut found = BTreeSet::new();
    domain.for_each::<(A, D)>(|entity, (a, d)| {
        assert_eq!(d.0, format!("d{}", a.0));
        found.insert(entity);
    });
    let expected: BTreeSet<_> = [6, 9, 12, 15, 18].iter().map(|&i| entities[i]).collect();
    assert_eq!(found, expected);
}

#[test]
fn stale_ids_are_rejected() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.attach::<A>(entity).unwrap();
    domain.destroy_entity(entity);
    domain.commit().unwrap();

    assert!(!domain.is_alive(entity));
    assert!(domain.entity(entity).is_none());
    assert_eq!(
        domain.attach::<B>(entity).map(|_| ()),
        Err(EcsError::EntityNotFound(entity))
    );
    domain.destroy_entity(entity);
    domain.detach::<A>(entity);
    assert!(!domain.has_pending_changes());

    let reused = domain.create_entity();
    assert_eq!(reused.index, entity.index);
    assert_ne!(reused, entity);
    assert!(domain.is_pending(reused));
    assert!(domain.get::<A>(reused).is_none());
}

#[test]
fn create_and_destroy_in_one_commit() {
    let mut domain = Domain::new();
    let keep = domain.create_entity();
    domain.attach::<A>(keep).unwrap();
    let gone = domain.create_entity();
    domain.attach::<A>(gone).unwrap();
    domain.attach::<B>(gone).unwrap();
    domain.destroy_entity(gone);
    domain.commit().unwrap();

    assert_eq!(domain.entities().collect::<Vec<_>>(), vec![keep]);
    assert_eq!(domain.component_count::<A>(), 1);
    assert_eq!(domain.component_count::<B>(), 0);
    check_signatures(&domain);
}

#[test]
fn idempotent_commit() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut domain = Domain::new();
    let entities: Vec<_> = (0..100).map(|_| domain.create_entity()).collect();
    for (i, &entity) in entities.iter().enumerate() {
        domain.attach_with(entity, A(i as u32)).unwrap();
        if rng.gen_bool(0.5) {
            domain.attach_with(entity, B(i as u32)).unwrap();
        }
    }
    domain.commit().unwrap();
    for &entity in &entities {
        if rng.gen_bool(0.2) {
            domain.destroy_entity(entity);
        } else if rng.gen_bool(0.2) {
            domain.detach::<A>(entity);
        }
    }
    domain.commit().unwrap();

    let snapshot = |domain: &mut Domain| {
        let mut rows = vec![];
        domain.for_each::<(B,)>(|entity, (b,)| rows.push((entity, b.0)));
        let live: Vec<_> = domain.entities().collect();
        let values: Vec<_> = entities
            .iter()
            .map(|&e| (domain.get::<A>(e).cloned(), domain.get::<B>(e).cloned()))
            .collect();
        (rows, live, values)
    };

    let first = snapshot(&mut domain);
    assert!(!domain.has_pending_changes());
    domain.commit().unwrap();
    assert_eq!(snapshot(&mut domain), first);
    check_signatures(&domain);
}

#[test]
fn compaction_preserves_values() {
    let mut rng = StdRng::seed_from_u64(7);
    let config = DomainConfig::default().with_secondary_chunk_len(7);
    let mut domain = Domain::with_config(config);

    let mut alive: Vec<(EntityId, u32)> = vec![];
    for round in 0..5u32 {
        for i in 0..60 {
            let entity = domain.create_entity();
            let value = round * 1000 + i;
            domain.attach_with(entity, A(value)).unwrap();
            domain.attach_with(entity, D(value.to_string())).unwrap();
            alive.push((entity, value));
        }

        alive.retain(|&(entity, _)| match rng.gen_range(0..4) {
            0 => {
                domain.destroy_entity(entity);
                false
            }
            1 => {
                domain.detach::<A>(entity);
                true
            }
            _ => true,
        });
        domain.commit().unwrap();

        for &(entity, value) in &alive {
            assert_eq!(domain.get::<D>(entity), Some(&D(value.to_string())));
            if let Some(a) = domain.get::<A>(entity) {
                assert_eq!(a.0, value);
            }
        }
        assert_eq!(domain.len(), alive.len());
        assert_eq!(domain.store::<A>().unwrap().chunk_count(), 0);
        check_signatures(&domain);
    }
}

#[test]
fn width_grows_with_new_types() {
    let mut domain = Domain::with_config(DomainConfig::default().with_signature_reserve_step(3));
    let entities: Vec<_> = (0..30)
        .map(|i| {
            let entity = domain.create_entity();
            domain.attach_with(entity, A(i)).unwrap();
            entity
        })
        .collect();
    domain.commit().unwrap();

    // A new type per commit, on different entities.
    for (n, &entity) in entities.iter().enumerate().filter(|(n, _)| n % 5 == 0) {
        match n % 3 {
            0 => drop(domain.attach_with(entity, B(n as u32)).unwrap()),
            1 => drop(domain.attach_with(entity, C(n as u32)).unwrap()),
            _ => drop(domain.attach_with(entity, TestComponent::new(n as i32)).unwrap()),
        }
        domain.commit().unwrap();
    }

    check_signatures(&domain);
    let mut count = 0;
    domain.for_each::<(A,)>(|entity, (a,)| {
        assert_eq!(entities[a.0 as usize], entity);
        count += 1;
    });
    assert_eq!(count, 30);

    let mut count = 0;
    domain.for_each::<(A, TestComponent)>(|_, (a, t)| {
        assert_eq!(a.0 as i32, t.i);
        count += 1;
    });
    assert_eq!(count, 2);
}

#[test]
fn commands_apply_at_next_commit() {
    let mut domain = Domain::new();
    let entities: Vec<_> = (0..6)
        .map(|i| {
            let entity = domain.create_entity();
            domain.attach_with(entity, A(i)).unwrap();
            entity
        })
        .collect();
    domain.commit().unwrap();

    let mut spawned = vec![];
    domain.for_each_with::<(A,)>(|commands, entity, (a,)| {
        match a.0 % 3 {
            0 => {
                let child = commands.create_entity();
                commands.attach_with(child, A(a.0 + 100));
                commands.attach_with(child, B(a.0));
                spawned.push(child);
            }
            1 => commands.destroy_entity(entity),
            _ => commands.attach_with(entity, C(a.0)),
        }
    });

    // Nothing changed yet.
    assert_eq!(domain.len(), 6);
    assert!(domain.has_pending_changes());
    assert!(domain.get::<C>(entities[2]).is_none());

    domain.commit().unwrap();
    assert_eq!(domain.len(), 6 - 2 + 2);
    assert!(!domain.is_alive(entities[1]));
    assert!(!domain.is_alive(entities[4]));
    assert_eq!(domain.get::<C>(entities[5]), Some(&C(5)));

    let mut found = vec![];
    domain.for_each::<(A, B)>(|entity, (a, b)| found.push((entity, a.0, b.0)));
    found.sort_unstable();
    let mut expected = vec![(spawned[0], 100, 0), (spawned[1], 103, 3)];
    expected.sort_unstable();
    assert_eq!(found, expected);

    domain.for_each_with::<(B,)>(|commands, entity, _| commands.detach::<B>(entity));
    domain.commit().unwrap();
    assert_eq!(domain.component_count::<B>(), 0);
    check_signatures(&domain);
}

#[test]
fn queued_attach_errors_surface_at_commit() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.attach::<A>(entity).unwrap();
    domain.commit().unwrap();

    domain.for_each_with::<(A,)>(|commands, entity, _| commands.attach_with(entity, A(1)));
    assert!(matches!(
        domain.commit(),
        Err(EcsError::DuplicateComponent { .. })
    ));
}

#[test]
fn failed_queued_op_keeps_the_rest_queued() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.attach::<A>(entity).unwrap();
    domain.commit().unwrap();

    let mut child = EntityId::NULL;
    domain.for_each_with::<(A,)>(|commands, entity, _| {
        commands.attach_with(entity, A(1));
        child = commands.create_entity();
        commands.attach_with(child, B(7));
    });

    assert!(matches!(
        domain.commit(),
        Err(EcsError::DuplicateComponent { .. })
    ));
    assert!(domain.has_pending_changes());
    assert!(domain.is_pending(child));

    domain.commit().unwrap();
    assert!(domain.is_alive(child));
    assert_eq!(domain.get::<B>(child), Some(&B(7)));
    assert_eq!(domain.get::<A>(entity), Some(&A(0)));
    check_signatures(&domain);

    let mut found = vec![];
    domain.for_each::<(B,)>(|entity, (b,)| found.push((entity, b.0)));
    assert_eq!(found, vec![(child, 7)]);
}

#[test]
fn sparse_query_over_large_store() {
    let mut domain = Domain::new();
    let entities: Vec<_> = (0..2000)
        .map(|i| {
            let entity = domain.create_entity();
            domain.attach_with(entity, A(i)).unwrap();
            entity
        })
        .collect();
    for &i in &[1999, 7, 1024] {
        domain.attach_with(entities[i], B(i as u32)).unwrap();
    }
    domain.commit().unwrap();

    let late: Vec<_> = (0..50)
        .map(|i| {
            let entity = domain.create_entity();
            domain.attach_with(entity, A(5000 + i)).unwrap();
            domain.attach_with(entity, B(5000 + i)).unwrap();
            entity
        })
        .collect();
    domain.commit().unwrap();
    let late_id = late[0];

    // Not committed yet: its `A` waits in a secondary chunk and is not visited.
    let pending = domain.create_entity();
    domain.attach_with(pending, A(9000)).unwrap();
    assert!(domain.store::<A>().unwrap().chunk_count() > 0);

    let mut found = BTreeSet::new();
    domain.for_each::<(B, A)>(|entity, (b, a)| {
        assert_eq!(a.0, b.0);
        a.0 += 1;
        found.insert(entity);
    });
    let mut expected: BTreeSet<_> = [1999, 7, 1024].iter().map(|&i| entities[i]).collect();
    expected.extend(late.iter().copied());
    assert_eq!(found, expected);

    assert_eq!(domain.get::<A>(entities[7]), Some(&A(8)));
    assert_eq!(domain.get::<A>(entities[8]), Some(&A(8)));
    assert_eq!(domain.get::<A>(late_id), Some(&A(5001)));
    assert_eq!(domain.get::<A>(pending), Some(&A(9000)));
}

#[test]
fn for_each_entity_visits_live_entities() {
    let mut domain = Domain::new();
    let entities: Vec<_> = (0..10).map(|_| domain.create_entity()).collect();

    let mut visited = vec![];
    domain.for_each_entity(|entity| visited.push(entity));
    assert!(visited.is_empty());

    domain.commit().unwrap();
    domain.destroy_entity(entities[4]);
    domain.commit().unwrap();

    domain.for_each_entity(|entity| visited.push(entity));
    assert_eq!(visited, domain.entities().collect::<Vec<_>>());
    assert_eq!(visited.len(), 9);
    assert!(!visited.contains(&entities[4]));
}

#[test]
fn entity_handles() {
    let mut domain = Domain::new();
    let id = domain.create_entity();
    {
        let mut entity = domain.entity_mut(id).unwrap();
        assert_eq!(entity.id(), id);
        entity.attach::<A>().unwrap().0 = 4;
        entity.attach_with(D("x".into())).unwrap();
        entity.get_mut::<A>().unwrap().0 += 1;
        assert!(entity.has::<D>());
        assert!(!entity.has::<B>());
    }
    domain.commit().unwrap();

    let entity = domain.entity(id).unwrap();
    assert_eq!(entity.get::<A>(), Some(&A(5)));

    let mut entity = domain.entity_mut(id).unwrap();
    entity.detach::<D>();
    entity.destroy();
    domain.commit().unwrap();
    assert!(domain.entity(id).is_none());
    assert!(domain.is_empty());
}

#[test]
fn detach_absent_is_noop() {
    let mut domain = Domain::new();
    let entity = domain.create_entity();
    domain.commit().unwrap();

    domain.detach::<A>(entity);
    assert!(!domain.has_pending_changes());

    domain.attach::<B>(entity).unwrap();
    domain.commit().unwrap();
    domain.detach::<A>(entity);
    domain.commit().unwrap();
    assert!(domain.has::<B>(entity));
    check_signatures(&domain);
}
