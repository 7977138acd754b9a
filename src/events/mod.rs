//! # Event Bus
//!
//! Typed publish/subscribe used by systems. The bus holds, for each event
//! type, a pool of handlers invoked synchronously in registration order on
//! the publishing thread.
//!
//! ## Handler identity
//!
//! Rust closures have no comparable identity, so subscription hands out an
//! [`EventHandlerId`] token; unsubscription is by token.
//!
//! ## Concurrency
//!
//! The bus is **not** internally synchronized. Publishing takes `&self` and
//! may happen concurrently for the same event type only when the callers
//! serialize through their declared resource accesses; subscription and
//! unsubscription take `&mut self` and therefore require exclusive access.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Identity token for a subscribed handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandlerId(u64);

type BoxedHandler<E> = Box<dyn Fn(&E) + Send + Sync>;

struct EventHandlerPool<E> {
    handlers: Vec<(EventHandlerId, BoxedHandler<E>)>,
}

impl<E> EventHandlerPool<E> {
    fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    fn propagate(&self, event: &E) {
        for (_, handler) in &self.handlers {
            handler(event);
        }
    }
}

/// Container for event handlers of any event type.
///
/// Subscribe handlers to the bus and publish events; see the module
/// documentation for the synchronization contract.
#[derive(Default)]
pub struct EventBus {
    pools: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    next_handler: u64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn pool<E: 'static + Send + Sync>(&self) -> Option<&EventHandlerPool<E>> {
        self.pools
            .get(&TypeId::of::<E>())
            .and_then(|pool| pool.downcast_ref::<EventHandlerPool<E>>())
    }

    fn assure<E: 'static + Send + Sync>(&mut self) -> &mut EventHandlerPool<E> {
        self.pools
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(EventHandlerPool::<E>::new()))
            .downcast_mut::<EventHandlerPool<E>>()
            .expect("event pool type keyed by TypeId")
    }

    /// Publishes the event to all handlers subscribed for its type, in
    /// registration order, synchronously on the calling thread.
    pub fn publish<E: 'static + Send + Sync>(&self, event: &E) {
        if let Some(pool) = self.pool::<E>() {
            pool.propagate(event);
        }
    }

    /// Subscribes a handler for events of type `E`, returning its identity
    /// token.
    pub fn subscribe<E: 'static + Send + Sync>(
        &mut self,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> EventHandlerId {
        let id = EventHandlerId(self.next_handler);
        self.next_handler += 1;
        self.assure::<E>().handlers.push((id, Box::new(handler)));
        id
    }

    /// Unsubscribes the handler with the given token.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unsubscribe<E: 'static + Send + Sync>(&mut self, id: EventHandlerId) -> bool {
        let pool = self.assure::<E>();
        match pool.handlers.iter().position(|(handler_id, _)| *handler_id == id) {
            Some(index) => {
                pool.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Amount of handlers currently subscribed for events of type `E`.
    pub fn count<E: 'static + Send + Sync>(&self) -> usize {
        self.pool::<E>().map_or(0, |pool| pool.handlers.len())
    }
}
