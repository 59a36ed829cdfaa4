use chrono::Weekday;
use cucumber::given;
use sog_common::Money;
use supplier_order_engine::{
    db_types::{NewOrder, NewOrderItem, NewSupplier, NewSupplierProduct},
    OrderManagement,
};

use crate::cucumber::{world::BUYER, OrderingSystem, SupplierOrderWorld};

const EVERY_DAY: [Weekday; 7] =
    [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun];

#[given("a fresh install")]
async fn fresh_database(world: &mut SupplierOrderWorld) {
    let system = OrderingSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "supplier '{word}' with a minimum order of {int} dollars")]
async fn add_supplier(world: &mut SupplierOrderWorld, name: String, minimum: i64) {
    let system = world.system_mut();
    let new_supplier = NewSupplier::new(name.clone(), format!("https://{}.example.com", name.to_lowercase()))
        .with_minimum(Money::from_dollars(minimum))
        .with_delivery_days(&EVERY_DAY);
    let (supplier, _) = system.engine.seed_supplier(new_supplier, &[]).await;
    system.suppliers.insert(name, supplier);
}

#[given(expr = "'{word}' sells {word} at {int} cents")]
async fn add_product(world: &mut SupplierOrderWorld, supplier: String, sku: String, cents: i64) {
    let system = world.system_mut();
    let supplier_id = system.supplier(&supplier).id;
    let price = Money::from_cents(cents);
    let product = system.engine.seed_product(NewSupplierProduct::new(supplier_id, sku.as_str(), sku.as_str(), price)).await;
    system.engine.supplier_site.set_price(&sku, price);
    system.products.insert(sku, product);
}

#[given(expr = "I have an account at '{word}'")]
async fn add_credential(world: &mut SupplierOrderWorld, supplier: String) {
    let system = world.system_mut();
    let supplier_id = system.supplier(&supplier).id;
    system.engine.seed_credential(BUYER, supplier_id).await;
}

#[given(expr = "I add {int} {word} to my order with '{word}'")]
async fn add_to_order(world: &mut SupplierOrderWorld, quantity: i64, sku: String, supplier: String) {
    let system = world.system_mut();
    let supplier_id = system.supplier(&supplier).id;
    let product_id = system.products.get(&sku).unwrap_or_else(|| panic!("Unknown product {sku}")).id;
    let order = match system.orders.get(&supplier) {
        Some(order) => order.clone(),
        None => system.engine.db.insert_order(NewOrder::new(BUYER, supplier_id)).await.expect("Error creating order"),
    };
    let order = system
        .engine
        .db
        .add_order_item(&order.id, NewOrderItem::new(product_id, quantity))
        .await
        .expect("Error adding item");
    system.orders.insert(supplier, order);
}
