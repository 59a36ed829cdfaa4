use crate::traits::{CatalogManagement, ChallengeManagement, OrderManagement, StoreError, ValidationLog};

/// The full set of behaviour a backend must provide for the order pipeline.
#[allow(async_fn_in_trait)]
pub trait SupplierOrderDatabase:
    Clone + OrderManagement + ValidationLog + CatalogManagement + ChallengeManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
