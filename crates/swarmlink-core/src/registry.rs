//! Link handle table.
//!
//! A protocol engine registers itself once against the [`LinkId`] of the
//! transport it drives. The transport's receive context then dispatches
//! inbound bytes by id and never holds a reference to the engine itself.
//! Entries are weak: dropping the engine silently retires its id, and
//! bytes for unknown ids are discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::ByteSink;

/// Opaque identity of one physical or simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u32);

impl LinkId {
    /// Wrap a raw id. Prefer [`LinkRegistry::allocate`] for fresh ids.
    pub const fn new(raw: u32) -> Self {
        LinkId(raw)
    }

    /// The raw numeric id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Table mapping link ids to the engine that owns each link.
#[derive(Default)]
pub struct LinkRegistry {
    next_id: AtomicU32,
    sinks: RwLock<HashMap<LinkId, Weak<dyn ByteSink>>>,
}

impl LinkRegistry {
    /// Create an empty registry, ready to share between transports and
    /// engines.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocate a fresh, never-reused link id.
    pub fn allocate(&self) -> LinkId {
        LinkId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `sink` as the owner of `id`.
    ///
    /// Fails if a live sink already owns the id; a stale entry left behind by
    /// a dropped engine is replaced.
    pub fn register(&self, id: LinkId, sink: Weak<dyn ByteSink>) -> Result<()> {
        let mut sinks = self.sinks.write();
        if sinks.get(&id).is_some_and(|s| s.strong_count() > 0) {
            return Err(Error::InvalidArgument(format!(
                "{id} already has a registered engine"
            )));
        }
        sinks.insert(id, sink);
        debug!(link = %id, "engine registered");
        Ok(())
    }

    /// Remove the entry for `id`, if any.
    pub fn unregister(&self, id: LinkId) {
        if self.sinks.write().remove(&id).is_some() {
            debug!(link = %id, "engine unregistered");
        }
    }

    /// Whether a live engine currently owns `id`.
    pub fn is_registered(&self, id: LinkId) -> bool {
        self.lookup(id).is_some()
    }

    /// Deliver one received byte to the owner of `id`.
    pub fn dispatch_byte(&self, id: LinkId, byte: u8) {
        match self.lookup(id) {
            Some(sink) => sink.on_byte_received(byte),
            None => trace!(link = %id, byte, "byte for unowned link dropped"),
        }
    }

    /// Deliver a run of received bytes, one at a time, to the owner of `id`.
    pub fn dispatch_bytes(&self, id: LinkId, bytes: &[u8]) {
        match self.lookup(id) {
            Some(sink) => bytes.iter().for_each(|&b| sink.on_byte_received(b)),
            None => trace!(link = %id, len = bytes.len(), "bytes for unowned link dropped"),
        }
    }

    /// Signal transmit completion to the owner of `id`.
    pub fn dispatch_transmit_complete(&self, id: LinkId) {
        match self.lookup(id) {
            Some(sink) => sink.on_transmit_complete(),
            None => trace!(link = %id, "transmit completion for unowned link dropped"),
        }
    }

    fn lookup(&self, id: LinkId) -> Option<Arc<dyn ByteSink>> {
        self.sinks.read().get(&id).and_then(Weak::upgrade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        bytes: Mutex<Vec<u8>>,
        completions: Mutex<u32>,
    }

    impl ByteSink for Recorder {
        fn on_byte_received(&self, byte: u8) {
            self.bytes.lock().push(byte);
        }

        fn on_transmit_complete(&self) {
            *self.completions.lock() += 1;
        }
    }

    fn as_weak(sink: &Arc<Recorder>) -> Weak<dyn ByteSink> {
        let sink: Arc<dyn ByteSink> = sink.clone();
        Arc::downgrade(&sink)
    }

    #[test]
    fn allocate_yields_distinct_ids() {
        let registry = LinkRegistry::new();
        let a = registry.allocate();
        let b = registry.allocate();
        assert_ne!(a, b);
    }

    #[test]
    fn dispatch_reaches_registered_sink() {
        let registry = LinkRegistry::new();
        let id = registry.allocate();
        let sink = Arc::new(Recorder::default());
        registry.register(id, as_weak(&sink)).unwrap();

        registry.dispatch_byte(id, 0x7F);
        registry.dispatch_bytes(id, &[0x01, 0x02]);
        registry.dispatch_transmit_complete(id);

        assert_eq!(*sink.bytes.lock(), vec![0x7F, 0x01, 0x02]);
        assert_eq!(*sink.completions.lock(), 1);
    }

    #[test]
    fn dispatch_to_other_link_is_isolated() {
        let registry = LinkRegistry::new();
        let ours = registry.allocate();
        let theirs = registry.allocate();
        let sink = Arc::new(Recorder::default());
        registry.register(ours, as_weak(&sink)).unwrap();

        registry.dispatch_byte(theirs, 0xAA);
        assert!(sink.bytes.lock().is_empty());
    }

    #[test]
    fn double_registration_rejected_while_alive() {
        let registry = LinkRegistry::new();
        let id = registry.allocate();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        registry.register(id, as_weak(&first)).unwrap();

        let result = registry.register(id, as_weak(&second));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn dropped_sink_retires_its_id() {
        let registry = LinkRegistry::new();
        let id = registry.allocate();
        let sink = Arc::new(Recorder::default());
        registry.register(id, as_weak(&sink)).unwrap();
        assert!(registry.is_registered(id));

        drop(sink);
        assert!(!registry.is_registered(id));
        // Dispatching to a dead entry is a no-op.
        registry.dispatch_byte(id, 0x00);

        let replacement = Arc::new(Recorder::default());
        registry.register(id, as_weak(&replacement)).unwrap();
        assert!(registry.is_registered(id));
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = LinkRegistry::new();
        let id = registry.allocate();
        let sink = Arc::new(Recorder::default());
        registry.register(id, as_weak(&sink)).unwrap();

        registry.unregister(id);
        registry.dispatch_byte(id, 0x01);
        assert!(sink.bytes.lock().is_empty());
    }

    #[test]
    fn link_id_display() {
        assert_eq!(LinkId::new(3).to_string(), "link#3");
        assert_eq!(LinkId::new(3).raw(), 3);
    }
}
