use crate::{
    db_types::{NewOrderValidation, OrderId, OrderValidation},
    traits::StoreError,
};

/// Append-only audit log of validation results. There are deliberately no update or delete methods.
#[allow(async_fn_in_trait)]
pub trait ValidationLog {
    async fn record_validations(&self, validations: &[NewOrderValidation]) -> Result<(), StoreError>;

    /// Validation rows for the order, oldest first.
    async fn fetch_validations(&self, order_id: &OrderId) -> Result<Vec<OrderValidation>, StoreError>;
}
