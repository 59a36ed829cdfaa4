use std::{fmt::Debug, sync::Arc};

use crate::{
    adapters::AdapterFactory,
    config::EngineConfig,
    events::EventProducers,
    messaging::MessageBus,
    task_queue::{JobScheduler, KeyedLocks},
};

/// The collaborators shared by every pipeline stage: the store, a way to reach suppliers, a way to defer work, the
/// user-facing two-factor channel and the event hooks.
///
/// `locks` must be the task queue's own ([`crate::task_queue::TaskQueue::locks`]) so that sessions opened outside the
/// queue are serialised with queued jobs on the same credential.
#[derive(Clone)]
pub struct EngineContext<B> {
    pub db: B,
    pub adapters: Arc<dyn AdapterFactory>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub bus: Arc<dyn MessageBus>,
    pub producers: EventProducers,
    pub config: EngineConfig,
    pub locks: KeyedLocks,
}

impl<B> Debug for EngineContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EngineContext({:?})", self.config)
    }
}

impl<B> EngineContext<B> {
    pub fn new(
        db: B,
        adapters: Arc<dyn AdapterFactory>,
        scheduler: Arc<dyn JobScheduler>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            db,
            adapters,
            scheduler,
            bus,
            producers: EventProducers::default(),
            config: EngineConfig::default(),
            locks: KeyedLocks::default(),
        }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_locks(mut self, locks: KeyedLocks) -> Self {
        self.locks = locks;
        self
    }
}
