//! Handler registry
//!
//! Ordered collection of live handlers. Mutations are serialized by a
//! writer mutex and rebuild an immutable snapshot (handlers plus cached
//! minimum level and aggregated collection requirements) that the hot path
//! reads with a single lock-free load.

use crate::handler::Handler;
use crate::record::CollectionRequirements;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct RegistryState {
    pub handlers: Vec<Arc<Handler>>,
    pub min_level: u16,
    pub requirements: CollectionRequirements,
}

impl RegistryState {
    fn rebuild(handlers: Vec<Arc<Handler>>) -> Self {
        let min_level = handlers
            .iter()
            .map(|h| h.level_no())
            .min()
            .unwrap_or(u16::MAX);
        let requirements = handlers
            .iter()
            .fold(CollectionRequirements::NONE, |acc, h| {
                acc | h.requirements()
            });
        Self {
            handlers,
            min_level,
            requirements,
        }
    }
}

pub(crate) struct HandlerRegistry {
    state: ArcSwap<RegistryState>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::rebuild(Vec::new())),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn insert(&self, handler: Handler) -> u64 {
        let id = handler.id();
        let _guard = self.write_lock.lock();
        let mut handlers = self.state.load().handlers.clone();
        handlers.push(Arc::new(handler));
        self.state.store(Arc::new(RegistryState::rebuild(handlers)));
        id
    }

    /// Detaches a handler from the registry. The caller is responsible for
    /// shutting the returned handler down (draining its worker); writes
    /// after removal are discarded with it.
    pub(crate) fn remove(&self, id: u64) -> Option<Arc<Handler>> {
        let _guard = self.write_lock.lock();
        let current = self.state.load();
        let index = current.handlers.iter().position(|h| h.id() == id)?;
        let mut handlers = current.handlers.clone();
        let removed = handlers.remove(index);
        self.state.store(Arc::new(RegistryState::rebuild(handlers)));
        Some(removed)
    }

    pub(crate) fn remove_all(&self) -> Vec<Arc<Handler>> {
        let _guard = self.write_lock.lock();
        let removed = self.state.load().handlers.clone();
        self.state
            .store(Arc::new(RegistryState::rebuild(Vec::new())));
        removed
    }

    /// Lock-free view of the current handlers and caches.
    pub(crate) fn snapshot(&self) -> Arc<RegistryState> {
        self.state.load_full()
    }

    pub(crate) fn min_level(&self) -> u16 {
        self.state.load().min_level
    }

    pub(crate) fn requirements(&self) -> CollectionRequirements {
        self.state.load().requirements
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.state.load().handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerConfig, LevelThreshold, SinkTarget};
    use crate::level::{Level, LevelRegistry};

    fn noop_handler(registry: &HandlerRegistry, level: Level) -> Handler {
        let config = HandlerConfig {
            sink: SinkTarget::Callable(std::sync::Arc::new(|_| Ok(()))),
            level: LevelThreshold::Level(level),
            format: Some("{message}".to_string()),
            ..Default::default()
        };
        Handler::build(registry.next_id(), config, &LevelRegistry::new()).unwrap()
    }

    #[test]
    fn test_min_level_cache() {
        let registry = HandlerRegistry::new();
        assert_eq!(registry.min_level(), u16::MAX);

        registry.insert(noop_handler(&registry, Level::Warning));
        assert_eq!(registry.min_level(), 30);

        let id = registry.insert(noop_handler(&registry, Level::Debug));
        assert_eq!(registry.min_level(), 10);

        registry.remove(id);
        assert_eq!(registry.min_level(), 30);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let registry = HandlerRegistry::new();
        let first = registry.insert(noop_handler(&registry, Level::Info));
        let second = registry.insert(noop_handler(&registry, Level::Info));

        let ids: Vec<u64> = registry
            .snapshot()
            .handlers
            .iter()
            .map(|h| h.id())
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_remove_all() {
        let registry = HandlerRegistry::new();
        registry.insert(noop_handler(&registry, Level::Info));
        registry.insert(noop_handler(&registry, Level::Info));

        let removed = registry.remove_all();
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.handler_count(), 0);
    }

    #[test]
    fn test_remove_missing_id() {
        let registry = HandlerRegistry::new();
        assert!(registry.remove(99).is_none());
    }
}
