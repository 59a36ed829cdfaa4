use cucumber::{then, when};
use sog_common::Money;
use supplier_order_engine::{
    adapters::{AdapterError, TwoFactorPrompt},
    db_types::{OrderStatusType, TwoFactorKind, ValidationType},
    order_objects::{CodeOutcome, PlacementOptions, PlacementOutcome},
    test_utils::Capability,
    OrderManagement,
    ValidationLog,
};

use crate::cucumber::{world::BUYER, SupplierOrderWorld};

#[when(expr = "I place my order with '{word}'")]
async fn place_order(world: &mut SupplierOrderWorld, supplier: String) {
    let system = world.system_mut();
    let order = system.order(&supplier).await;
    let outcome = system.engine.placement().place_order(&order.id, PlacementOptions::default()).await;
    system.last_outcome = Some(outcome.expect("Error placing order"));
}

#[when(expr = "'{word}' asks for a code at checkout")]
async fn code_at_checkout(world: &mut SupplierOrderWorld, _supplier: String) {
    let prompt = TwoFactorPrompt::new(TwoFactorKind::Sms, "Enter the code we sent to your phone");
    world.system().engine.supplier_site.fail_next(Capability::Checkout, AdapterError::TwoFactorRequired(prompt));
}

#[when(expr = "'{word}' expects the code {string}")]
async fn valid_code(world: &mut SupplierOrderWorld, _supplier: String, code: String) {
    world.system().engine.supplier_site.set_valid_code(&code);
}

#[when(expr = "I enter the code {string}")]
async fn enter_code(world: &mut SupplierOrderWorld, code: String) {
    let system = world.system();
    let Some(PlacementOutcome::PendingManual { session_token: Some(token), .. }) = &system.last_outcome else {
        panic!("No code was requested. Last outcome: {:?}", system.last_outcome);
    };
    let result = system.engine.two_factor().submit_code(BUYER, token, &code).await.expect("Error submitting code");
    assert_eq!(result, CodeOutcome::Verified);
}

#[when("the queued work runs")]
async fn run_queued_work(world: &mut SupplierOrderWorld) {
    world.system_mut().run_queued_jobs().await;
}

#[when(expr = "I check the prices on my order with '{word}'")]
async fn verify_prices(world: &mut SupplierOrderWorld, supplier: String) {
    let system = world.system();
    let order = system.order(&supplier).await;
    system.engine.prices().verify_order(&order.id).await.expect("Error verifying prices");
}

#[then(expr = "my order with '{word}' is {word}")]
async fn order_status(world: &mut SupplierOrderWorld, supplier: String, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Not a valid order status");
    let order = world.system().order(&supplier).await;
    assert_eq!(order.status, expected, "Order status was {}: {:?}", order.status, order.error_message);
}

#[then(expr = "the price check on my order with '{word}' is {word}")]
async fn verification_status(world: &mut SupplierOrderWorld, supplier: String, status: String) {
    let order = world.system().order(&supplier).await;
    assert_eq!(order.verification_status.to_string(), status);
}

#[then(expr = "the confirmation number is {word}")]
async fn confirmation_number(world: &mut SupplierOrderWorld, expected: String) {
    match &world.system().last_outcome {
        Some(PlacementOutcome::Submitted { confirmation_number, .. }) => assert_eq!(confirmation_number, &expected),
        other => panic!("The order was not submitted: {other:?}"),
    }
}

#[then(expr = "the order total with '{word}' is {int} cents")]
async fn order_total(world: &mut SupplierOrderWorld, supplier: String, cents: i64) {
    let order = world.system().order(&supplier).await;
    assert_eq!(order.total_amount, Money::from_cents(cents));
}

#[then(expr = "I am told to add {word} more to my order with '{word}'")]
async fn minimum_shortfall(world: &mut SupplierOrderWorld, difference: String, supplier: String) {
    let system = world.system();
    let order = system.order(&supplier).await;
    let validations = system.engine.db.fetch_validations(&order.id).await.expect("Error fetching validations");
    let shortfall = validations
        .iter()
        .find(|v| v.validation_type == ValidationType::OrderMinimum)
        .expect("No order minimum finding was logged");
    assert!(!shortfall.passed);
    assert_eq!(shortfall.details.0["difference"], difference.as_str());
}

#[then(expr = "my order with '{word}' was checked against the supplier only once")]
async fn checked_once(world: &mut SupplierOrderWorld, supplier: String) {
    let system = world.system();
    let order = system.order(&supplier).await;
    let validations = system.engine.db.fetch_validations(&order.id).await.expect("Error fetching validations");
    assert!(validations.is_empty(), "Unexpected findings: {validations:?}");
    // One stock check per item, all from the first attempt.
    let items = system.engine.db.fetch_order_items(&order.id).await.expect("Error fetching items");
    assert_eq!(system.engine.supplier_site.count(Capability::CheckStock), items.len());
}

#[then("the supplier was never contacted")]
async fn no_supplier_calls(world: &mut SupplierOrderWorld) {
    let site = &world.system().engine.supplier_site;
    assert_eq!(site.connections(), 0);
    assert!(site.calls().is_empty(), "{:?}", site.calls());
}

#[then(expr = "the supplier received {int} checkout(s)")]
async fn checkouts(world: &mut SupplierOrderWorld, count: usize) {
    assert_eq!(world.system().engine.supplier_site.count(Capability::Checkout), count);
}
