use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axion::{AccessSets, App, EventBus, ExecutionError, FnSystem, ThreadPool};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Damage {
    amount: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Heal {
    amount: u32,
}

struct CombatStage;

#[test]
fn handlers_run_in_registration_order() {
    let mut bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in 0..3u8 {
        let log = Arc::clone(&log);
        bus.subscribe::<Damage>(move |event| {
            log.lock().unwrap().push((tag, event.amount));
        });
    }

    bus.publish(&Damage { amount: 7 });

    assert_eq!(*log.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
}

#[test]
fn publish_without_subscribers_is_a_noop() {
    let bus = EventBus::new();
    bus.publish(&Damage { amount: 1 });
    assert_eq!(bus.count::<Damage>(), 0);
}

#[test]
fn unsubscribe_by_token() {
    let mut bus = EventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let keep = {
        let hits = Arc::clone(&hits);
        bus.subscribe::<Damage>(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    };
    let drop_me = {
        let hits = Arc::clone(&hits);
        bus.subscribe::<Damage>(move |_| {
            hits.fetch_add(100, Ordering::SeqCst);
        })
    };
    assert_eq!(bus.count::<Damage>(), 2);

    assert!(bus.unsubscribe::<Damage>(drop_me));
    assert!(!bus.unsubscribe::<Damage>(drop_me));
    assert_eq!(bus.count::<Damage>(), 1);

    bus.publish(&Damage { amount: 1 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(bus.unsubscribe::<Damage>(keep));
    bus.publish(&Damage { amount: 1 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn event_types_are_isolated() {
    let mut bus = EventBus::new();
    let damage_seen = Arc::new(AtomicUsize::new(0));
    let heal_seen = Arc::new(AtomicUsize::new(0));

    {
        let damage_seen = Arc::clone(&damage_seen);
        bus.subscribe::<Damage>(move |event| {
            damage_seen.fetch_add(event.amount as usize, Ordering::SeqCst);
        });
    }
    {
        let heal_seen = Arc::clone(&heal_seen);
        bus.subscribe::<Heal>(move |event| {
            heal_seen.fetch_add(event.amount as usize, Ordering::SeqCst);
        });
    }

    bus.publish(&Damage { amount: 3 });
    bus.publish(&Heal { amount: 11 });

    assert_eq!(damage_seen.load(Ordering::SeqCst), 3);
    assert_eq!(heal_seen.load(Ordering::SeqCst), 11);
}

#[test]
fn systems_publish_through_the_world() {
    let mut app = App::with_pool(ThreadPool::with_threads(2)).unwrap();
    let total = Arc::new(AtomicUsize::new(0));

    {
        let total = Arc::clone(&total);
        app.world()
            .events_mut()
            .unwrap()
            .subscribe::<Damage>(move |event| {
                total.fetch_add(event.amount as usize, Ordering::SeqCst);
            });
    }

    app.add_system::<CombatStage>(FnSystem::new(
        "attacker",
        AccessSets::new().writes_resource::<EventBus>().unwrap(),
        move |world| {
            let events = world
                .events()
                .map_err(|e| ExecutionError::failure(e.to_string()))?;
            events.publish(&Damage { amount: 4 });
            events.publish(&Damage { amount: 6 });
            Ok(())
        },
    ))
    .unwrap();

    app.schedule::<CombatStage>().unwrap();
    app.run().unwrap();

    assert_eq!(total.load(Ordering::SeqCst), 10);
}
