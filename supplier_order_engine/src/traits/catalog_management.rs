use chrono::{DateTime, Utc};
use sog_common::Money;

use crate::{
    db_types::{
        CredentialStatus,
        NewSupplier,
        NewSupplierCredential,
        NewSupplierProduct,
        Supplier,
        SupplierCredential,
        SupplierProduct,
    },
    traits::StoreError,
};

/// Read access to suppliers, their products and user credentials, plus the few writes the order pipeline makes to
/// them (refreshed prices and stock, credential holds). The insert methods exist for seeding.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_supplier(&self, supplier: NewSupplier) -> Result<Supplier, StoreError>;

    async fn fetch_supplier(&self, supplier_id: i64) -> Result<Option<Supplier>, StoreError>;

    async fn insert_product(&self, product: NewSupplierProduct) -> Result<SupplierProduct, StoreError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<SupplierProduct>, StoreError>;

    async fn fetch_product_by_sku(&self, supplier_id: i64, sku: &str) -> Result<Option<SupplierProduct>, StoreError>;

    /// Stores a freshly observed price (and optionally stock level) and stamps `price_updated_at`.
    async fn update_product_price(
        &self,
        product_id: i64,
        price: Money,
        in_stock: Option<bool>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn update_product_stock(&self, product_id: i64, in_stock: bool) -> Result<(), StoreError>;

    async fn insert_credential(&self, credential: NewSupplierCredential) -> Result<SupplierCredential, StoreError>;

    async fn fetch_credential(&self, credential_id: i64) -> Result<Option<SupplierCredential>, StoreError>;

    /// The user's most recently created credential at the supplier, whatever its status.
    async fn fetch_credential_for_supplier(
        &self,
        user_id: i64,
        supplier_id: i64,
    ) -> Result<Option<SupplierCredential>, StoreError>;

    async fn set_credential_status(&self, credential_id: i64, status: CredentialStatus) -> Result<(), StoreError>;
}
