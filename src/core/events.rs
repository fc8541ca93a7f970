use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

/// Shared callback stored by an [`EventEmitter`].
pub type Listener<E> = Rc<dyn Fn(&E)>;

struct ListenerSlot<E> {
    id: u64,
    listener: Listener<E>,
}

struct EmitterShared<E> {
    next_id: Cell<u64>,
    slots: RefCell<Vec<ListenerSlot<E>>>,
}

impl<E> EmitterShared<E> {
    fn has_listener(&self, id: u64) -> bool {
        self.slots.borrow().iter().any(|slot| slot.id == id)
    }
}

trait DetachListener {
    fn detach(&self, id: u64);
    fn is_attached(&self, id: u64) -> bool;
}

impl<E> DetachListener for EmitterShared<E> {
    fn detach(&self, id: u64) {
        self.slots.borrow_mut().retain(|slot| slot.id != id);
    }

    fn is_attached(&self, id: u64) -> bool {
        self.has_listener(id)
    }
}

/// Single-threaded typed publish/subscribe channel.
///
/// Emission is synchronous and re-entrant: listeners may emit further events,
/// subscribe, or drop subscriptions (including their own) while being invoked.
/// No internal borrow is held while a listener runs. A listener detached during
/// an emission is not invoked for the remainder of that emission.
pub struct EventEmitter<E> {
    shared: Rc<EmitterShared<E>>,
}

impl<E: 'static> EventEmitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(EmitterShared {
                next_id: Cell::new(1),
                slots: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Registers `listener` and returns the handle that owns the registration.
    ///
    /// Dropping the returned [`Subscription`] detaches the listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + 'static,
    {
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);
        self.shared.slots.borrow_mut().push(ListenerSlot {
            id,
            listener: Rc::new(listener),
        });

        let shared: Rc<dyn DetachListener> = self.shared.clone();
        Subscription {
            emitter: Rc::downgrade(&shared),
            id,
        }
    }

    /// Invokes every attached listener in subscription order.
    ///
    /// Returns the number of listeners that were invoked.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: SmallVec<[(u64, Listener<E>); 4]> = self
            .shared
            .slots
            .borrow()
            .iter()
            .map(|slot| (slot.id, Rc::clone(&slot.listener)))
            .collect();

        let mut invoked = 0;
        for (id, listener) in snapshot {
            if !self.shared.has_listener(id) {
                continue;
            }
            listener(event);
            invoked += 1;
        }
        invoked
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.slots.borrow().len()
    }

    /// Detaches every listener. Outstanding subscriptions become inert.
    pub fn clear(&self) {
        let drained: Vec<ListenerSlot<E>> = self.shared.slots.borrow_mut().drain(..).collect();
        drop(drained);
    }
}

impl<E: 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.shared.slots.borrow().len())
            .finish()
    }
}

/// Registration handle returned by [`EventEmitter::subscribe`].
///
/// The listener stays attached exactly as long as this handle lives.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    emitter: Weak<dyn DetachListener>,
    id: u64,
}

impl Subscription {
    /// Detaches the listener now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}

    /// Returns `true` while the emitter is alive and still holds the listener.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.emitter
            .upgrade()
            .is_some_and(|emitter| emitter.is_attached(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(emitter) = self.emitter.upgrade() {
            emitter.detach(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
