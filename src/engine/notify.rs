//! Change notification bus
//!
//! Observers only ever receive the new version number. They must re-read the
//! engine state after each callback, since several changes may land before an
//! observer gets to react.

use crate::engine::generation::WrappingCounter;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback = Rc<RefCell<dyn FnMut(u64)>>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Version counter plus the observer list
pub struct NotificationBus {
    version: WrappingCounter,
    observers: Rc<RefCell<Observers>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            version: WrappingCounter::starting_at(0),
            observers: Rc::new(RefCell::new(Observers::default())),
        }
    }

    pub fn current_version(&self) -> u64 {
        self.version.get()
    }

    /// Register an observer; keep the returned handle to unsubscribe later
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(u64) + 'static,
    {
        let mut observers = self.observers.borrow_mut();
        let id = observers.next_id;
        observers.next_id += 1;
        let callback: Callback = Rc::new(RefCell::new(callback));
        observers.entries.push((id, callback));

        Subscription {
            id,
            observers: Rc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().entries.len()
    }

    /// Bump the version, then call every observer synchronously
    pub fn notify(&mut self) -> u64 {
        let version = self.version.advance();

        // Snapshot the list so observers may unsubscribe from inside a callback
        let callbacks: Vec<Callback> = self
            .observers
            .borrow()
            .entries
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in callbacks {
            // A callback that re-enters itself is skipped rather than aliased
            if let Ok(mut cb) = callback.try_borrow_mut() {
                (&mut *cb)(version);
            }
        }
        version
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`NotificationBus::subscribe`]
///
/// The observer stays registered for as long as the handle lives; dropping it
/// unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    observers: Weak<RefCell<Observers>>,
}

impl Subscription {
    /// Stop receiving notifications. A no-op if the bus is already gone.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers
                .borrow_mut()
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_notify_advances_version_and_calls_observers() {
        let mut bus = NotificationBus::new();
        let seen = Rc::new(Cell::new(0u64));
        let seen_clone = Rc::clone(&seen);
        let _sub = bus.subscribe(move |v| seen_clone.set(v));

        let before = bus.current_version();
        let v = bus.notify();
        assert_eq!(v, before + 1);
        assert_eq!(seen.get(), v);
        assert_eq!(bus.current_version(), v);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = NotificationBus::new();
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);
        let sub = bus.subscribe(move |_| calls_clone.set(calls_clone.get() + 1));

        bus.notify();
        sub.unsubscribe();
        bus.notify();

        assert_eq!(calls.get(), 1);
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn test_dropping_handle_unsubscribes() {
        let mut bus = NotificationBus::new();
        let calls = Rc::new(Cell::new(0));
        {
            let calls_clone = Rc::clone(&calls);
            let _sub = bus.subscribe(move |_| calls_clone.set(calls_clone.get() + 1));
            bus.notify();
            assert_eq!(bus.observer_count(), 1);
        }
        bus.notify();

        assert_eq!(calls.get(), 1);
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let mut bus = NotificationBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot_clone = Rc::clone(&slot);
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);

        let sub = bus.subscribe(move |_| {
            calls_clone.set(calls_clone.get() + 1);
            if let Some(sub) = slot_clone.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);

        bus.notify();
        bus.notify();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = NotificationBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        sub.unsubscribe();
    }
}
