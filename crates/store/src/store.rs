use async_trait::async_trait;
use common::{CouponId, OrderId, ProductId, UserId};
use domain::{CartLine, Coupon, Order, OrderNumber, Product};

use crate::Result;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Stock was decremented by the requested quantity.
    Reserved,
    /// Nothing changed; `available` is what the row held.
    Insufficient { available: u32 },
}

/// Core trait for fulfillment store implementations.
///
/// Reads outside a transaction see committed state only. Every mutation of
/// stock, coupon usage and orders goes through a [`StoreTransaction`].
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    type Transaction: StoreTransaction + 'static;

    /// Starts a transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    async fn product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Looks up a coupon by code, case-insensitively.
    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>>;

    /// All orders placed by a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Inserts or replaces a catalog product.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Inserts or replaces a coupon. The code is stored normalized.
    async fn upsert_coupon(&self, coupon: Coupon) -> Result<()>;

    /// Replaces a user's saved cart.
    async fn put_cart(&self, user_id: UserId, lines: Vec<CartLine>) -> Result<()>;

    /// A user's saved cart, empty if none.
    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;
}

/// A unit of work against the store.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`]
/// rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn product(&mut self, id: &ProductId) -> Result<Option<Product>>;

    /// Looks up a coupon by code and locks it until the transaction ends.
    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>>;

    /// Decrements stock by `quantity` only if at least that much is
    /// available. The check and the decrement are one atomic step.
    async fn reserve_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Reservation>;

    /// Returns `quantity` units to stock. Always succeeds for a known product.
    async fn release_stock(&mut self, id: &ProductId, quantity: u32) -> Result<()>;

    /// Increments the coupon's used count if it is still under its usage
    /// limit. Returns false when the cap was reached first.
    async fn redeem_coupon(&mut self, id: CouponId) -> Result<bool>;

    /// Decrements the coupon's used count, never below zero.
    async fn unredeem_coupon(&mut self, id: CouponId) -> Result<()>;

    /// Loads an order and locks it until the transaction ends.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Persists a new order with its line items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Persists the mutable header fields of an existing order.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Empties a user's cart. A missing cart is not an error.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<()>;

    /// Makes every change in this transaction visible atomically.
    async fn commit(self) -> Result<()>;
}
