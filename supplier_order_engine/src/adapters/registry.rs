use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::*;

use crate::adapters::{AdapterError, AdapterFactory, AdapterResult, SessionContext, SupplierAdapter};

/// An [`AdapterFactory`] that hands each connection to the factory registered for the supplier.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<i64, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for a supplier, replacing any earlier one.
    pub fn register(&mut self, supplier_id: i64, factory: Arc<dyn AdapterFactory>) -> &mut Self {
        if self.factories.insert(supplier_id, factory).is_some() {
            warn!("🛫️ The adapter for supplier {supplier_id} was replaced");
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }
}

#[async_trait]
impl AdapterFactory for AdapterRegistry {
    async fn connect(&self, context: SessionContext) -> AdapterResult<Box<dyn SupplierAdapter>> {
        let Some(factory) = self.factories.get(&context.supplier.id) else {
            return Err(AdapterError::Unexpected(format!(
                "No adapter is registered for {} ({})",
                context.supplier.name, context.supplier.website_url
            )));
        };
        trace!("🛫️ Connecting to {} for credential {}", context.supplier.name, context.credential.id);
        factory.connect(context).await
    }
}
