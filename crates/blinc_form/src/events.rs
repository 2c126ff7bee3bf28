//! Named-channel event emitter
//!
//! A small publish/subscribe registry. Each channel keeps two ordered
//! listener lists:
//!
//! - **first** listeners (registered with `is_first`) run before everything
//!   else, most recently registered first
//! - **regular** listeners run afterwards, in registration order
//!
//! [`EventEmitter::emit`] iterates a snapshot taken when the emission
//! starts, so listeners may subscribe or unsubscribe (themselves or others)
//! while it runs. A listener removed mid-emission is skipped; one added
//! mid-emission first runs on the next emission.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::events::{EventEmitter, ListenerOptions};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let emitter = EventEmitter::<str>::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let log = seen.clone();
//! let _a = emitter.on("greet", move |name: &str| log.borrow_mut().push(format!("a:{name}")), ListenerOptions::default());
//! let log = seen.clone();
//! let _b = emitter.on("greet", move |name: &str| log.borrow_mut().push(format!("b:{name}")), ListenerOptions::first());
//!
//! emitter.emit("greet", "ann");
//! assert_eq!(*seen.borrow(), vec!["b:ann", "a:ann"]);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Unique identifier for a registered listener
    pub struct ListenerId;
}

/// Channel carrying every state transition
pub const STATE_CHANNEL: &str = "state";
/// Channel notified after a form reset
pub const RESET_CHANNEL: &str = "reset";
/// Channel notified right before the submit handler runs
pub const SUBMIT_CHANNEL: &str = "submit";

/// Registration options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Run ahead of regular listeners (newest first)
    pub is_first: bool,
}

impl ListenerOptions {
    /// Options for a high-priority listener
    pub fn first() -> Self {
        Self { is_first: true }
    }
}

#[derive(Default)]
struct Channel {
    first: Vec<ListenerId>,
    regular: Vec<ListenerId>,
}

impl Channel {
    fn is_empty(&self) -> bool {
        self.first.is_empty() && self.regular.is_empty()
    }

    /// Invocation order: first listeners newest-first, then regular ones
    fn ordered(&self) -> impl Iterator<Item = ListenerId> + '_ {
        self.first.iter().rev().chain(self.regular.iter()).copied()
    }
}

struct Registry<T: ?Sized + 'static> {
    listeners: SlotMap<ListenerId, Rc<dyn Fn(&T)>>,
    channels: FxHashMap<String, Channel>,
}

impl<T: ?Sized + 'static> Registry<T> {
    fn remove(&mut self, name: &str, id: ListenerId) -> bool {
        if self.listeners.remove(id).is_none() {
            return false;
        }
        if let Some(channel) = self.channels.get_mut(name) {
            channel.first.retain(|l| *l != id);
            channel.regular.retain(|l| *l != id);
            if channel.is_empty() {
                self.channels.remove(name);
            }
        }
        true
    }
}

/// Publish/subscribe registry keyed by channel name
pub struct EventEmitter<T: ?Sized + 'static> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: ?Sized + 'static> EventEmitter<T> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                listeners: SlotMap::with_key(),
                channels: FxHashMap::default(),
            })),
        }
    }

    /// Register `listener` on channel `name`.
    ///
    /// The listener stays registered until the returned handle is dropped or
    /// [`SubscriptionHandle::unsubscribe`] is called.
    pub fn on<F>(&self, name: &str, listener: F, options: ListenerOptions) -> SubscriptionHandle
    where
        F: Fn(&T) + 'static,
    {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.listeners.insert(Rc::new(listener));
            let channel = registry.channels.entry(name.to_string()).or_default();
            if options.is_first {
                channel.first.push(id);
            } else {
                channel.regular.push(id);
            }
            id
        };

        let registry: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        let channel = name.to_string();
        SubscriptionHandle::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().remove(&channel, id);
            }
        })
    }

    /// Invoke every listener on channel `name` with `payload`.
    ///
    /// Returns how many listeners ran.
    pub fn emit(&self, name: &str, payload: &T) -> usize {
        let snapshot: Vec<(ListenerId, Rc<dyn Fn(&T)>)> = {
            let registry = self.registry.borrow();
            let Some(channel) = registry.channels.get(name) else {
                return 0;
            };
            channel
                .ordered()
                .filter_map(|id| registry.listeners.get(id).map(|l| (id, l.clone())))
                .collect()
        };

        let mut invoked = 0;
        for (id, listener) in snapshot {
            // Skip listeners removed by an earlier listener in this emission
            if !self.registry.borrow().listeners.contains_key(id) {
                continue;
            }
            listener(payload);
            invoked += 1;
        }
        invoked
    }

    /// Number of listeners on channel `name`
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry
            .borrow()
            .channels
            .get(name)
            .map(|c| c.first.len() + c.regular.len())
            .unwrap_or(0)
    }

    /// Drop every listener on every channel
    pub fn remove_all_listeners(&self) {
        let mut registry = self.registry.borrow_mut();
        registry.listeners.clear();
        registry.channels.clear();
    }
}

impl<T: ?Sized + 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("EventEmitter")
            .field("channels", &registry.channels.len())
            .field("listeners", &registry.listeners.len())
            .finish()
    }
}

/// Keeps a listener or subscriber registered.
///
/// Dropping the handle unsubscribes; [`detach`](Self::detach) keeps the
/// registration alive for as long as its registry lives.
#[must_use = "dropping a SubscriptionHandle unsubscribes immediately"]
pub struct SubscriptionHandle {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Unsubscribe now
    pub fn unsubscribe(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Give up the ability to unsubscribe
    pub fn detach(mut self) {
        self.dispose = None;
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}
