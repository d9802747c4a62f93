//! Origin → handler cache.
//!
//! # Responsibilities
//! - Hand out the single cached handler for an origin, creating it on first use
//! - Grow monotonically during normal operation (no eviction, no removal on error)
//! - Close every handler exactly once when drained at shutdown
//!
//! # Design Decisions
//! - Creation runs inside the DashMap entry, which holds the shard write lock,
//!   so concurrent first requests for one origin converge on one handler.
//! - The registry is an owned value passed around as `Arc<HandlerRegistry>`,
//!   never a global.
//! - Growth is unbounded: one entry per distinct origin ever seen. The size is
//!   logged and exported as a gauge on every insert.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::dispatch::handler::{ForwardingHandler, OriginHandler};
use crate::dispatch::origin::OriginKey;
use crate::observability::metrics;

/// Thread-safe mapping from origin key to its forwarding handler.
#[derive(Debug)]
pub struct HandlerRegistry<H = ForwardingHandler> {
    handlers: DashMap<OriginKey, Arc<H>>,
}

impl<H: OriginHandler> HandlerRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Return the handler for `origin`, building it with `factory` if absent.
    ///
    /// If `factory` fails nothing is stored and the error is returned; the next
    /// request for the origin tries again.
    pub fn get_or_create<F, E>(&self, origin: &OriginKey, factory: F) -> Result<Arc<H>, E>
    where
        F: FnOnce(&OriginKey) -> Result<H, E>,
    {
        if let Some(existing) = self.handlers.get(origin) {
            return Ok(Arc::clone(existing.value()));
        }

        let created = match self.handlers.entry(origin.clone()) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let handler = Arc::new(factory(origin)?);
                Arc::clone(entry.insert(handler).value())
            }
        };

        // The shard lock is released above; len() needs every shard.
        let size = self.handlers.len();
        tracing::info!(
            origin = %origin,
            registry_size = size,
            "Added forwarding handler for new origin"
        );
        metrics::record_handler_count(size);

        Ok(created)
    }

    /// Close and remove every handler. Returns how many were closed.
    ///
    /// Safe to call repeatedly; an empty registry is a no-op.
    pub fn drain_all(&self) -> usize {
        let origins = self.origins();
        let mut closed = 0;

        for origin in origins {
            // remove() hands each entry to exactly one caller.
            if let Some((origin, handler)) = self.handlers.remove(&origin) {
                handler.close();
                closed += 1;
                tracing::info!(origin = %origin, "Closed forwarding handler");
            }
        }

        if closed > 0 {
            metrics::record_handler_count(self.handlers.len());
            tracing::info!(closed, "Handler registry drained");
        }
        closed
    }

    /// Current handler for `origin`, if one exists.
    pub fn get(&self, origin: &OriginKey) -> Option<Arc<H>> {
        self.handlers.get(origin).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, origin: &OriginKey) -> bool {
        self.handlers.contains_key(origin)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Snapshot of the cached origin keys.
    pub fn origins(&self) -> Vec<OriginKey> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl<H: OriginHandler> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
