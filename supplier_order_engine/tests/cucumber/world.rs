use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use log::*;
use supplier_order_engine::{
    db_types::{Order, Supplier, SupplierProduct},
    order_objects::PlacementOutcome,
    task_queue::execute,
    test_utils::{FakeSupplier, TestEngine},
    EngineJobRunner,
    OrderManagement,
};

pub const BUYER: i64 = 1;

#[derive(Default, Debug, World)]
pub struct SupplierOrderWorld {
    pub system: Option<OrderingSystem>,
}

/// The engine under test, plus the names the scenarios use to refer to what they created.
pub struct OrderingSystem {
    pub engine: TestEngine,
    pub suppliers: HashMap<String, Supplier>,
    pub products: HashMap<String, SupplierProduct>,
    /// The draft order for each supplier, by supplier name.
    pub orders: HashMap<String, Order>,
    pub last_outcome: Option<PlacementOutcome>,
    /// Jobs already taken from the recording scheduler.
    pub jobs_run: usize,
}

impl Debug for OrderingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderingSystem({})", self.engine.url)
    }
}

impl SupplierOrderWorld {
    pub fn system(&self) -> &OrderingSystem {
        self.system.as_ref().expect("Ordering system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut OrderingSystem {
        self.system.as_mut().expect("Ordering system not initialised")
    }
}

impl OrderingSystem {
    pub async fn new() -> Self {
        let engine = TestEngine::new(FakeSupplier::full()).await;
        debug!("🚀️ Created database: {}", engine.url);
        Self {
            engine,
            suppliers: HashMap::new(),
            products: HashMap::new(),
            orders: HashMap::new(),
            last_outcome: None,
            jobs_run: 0,
        }
    }

    pub fn supplier(&self, name: &str) -> &Supplier {
        self.suppliers.get(name).unwrap_or_else(|| panic!("Unknown supplier {name}"))
    }

    pub async fn order(&self, supplier: &str) -> Order {
        let order = self.orders.get(supplier).unwrap_or_else(|| panic!("No order with {supplier}"));
        self.engine.db.fetch_order(&order.id).await.expect("Error fetching order").expect("Order was deleted")
    }

    /// Runs every job the engine has deferred since the last call.
    pub async fn run_queued_jobs(&mut self) {
        let jobs = self.engine.scheduler.jobs();
        let runner = EngineJobRunner::new(self.engine.ctx.clone());
        for job in &jobs[self.jobs_run..] {
            let outcome = execute(&runner, job).await;
            debug!("🚀️ {:?} finished: {outcome:?}", job.kind);
        }
        self.jobs_run = jobs.len();
    }
}
