use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CouponId, OrderId, ProductId, UserId};
use domain::{CartLine, Coupon, Order, OrderNumber, Product, normalize_code};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{FulfillmentStore, Reservation, Result, StoreError, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    coupons: HashMap<CouponId, Coupon>,
    orders: HashMap<OrderId, Order>,
    carts: HashMap<UserId, Vec<CartLine>>,
}

impl State {
    fn coupon_by_code(&self, code: &str) -> Option<&Coupon> {
        let code = normalize_code(code);
        self.coupons.values().find(|c| c.code == code)
    }

    fn coupon_mut(&mut self, id: CouponId) -> Result<&mut Coupon> {
        self.coupons
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown coupon {id}")))
    }

    fn product_mut(&mut self, id: &ProductId) -> Result<&mut Product> {
        self.products
            .get_mut(id)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown product {id}")))
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_commit: bool,
    conflicts_remaining: u32,
    lost_redemptions: u32,
}

/// In-memory fulfillment store for testing and local runs.
///
/// A transaction holds the store's write lock for its whole lifetime and
/// works on a private copy of the state, so transactions are serializable
/// and dropping one discards its changes.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every commit fail with [`StoreError::Unavailable`].
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.faults.write().await.fail_on_commit = fail;
    }

    /// Makes the next `count` commits fail with [`StoreError::Conflict`].
    pub async fn inject_commit_conflicts(&self, count: u32) {
        self.faults.write().await.conflicts_remaining = count;
    }

    /// Makes the next `count` coupon redemptions lose to a rival order that
    /// takes the coupon's remaining uses first. The rival's redemption is
    /// already committed, so it survives a rollback.
    pub async fn inject_lost_redemptions(&self, count: u32) {
        self.faults.write().await.lost_redemptions = count;
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.state.clone().write_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.state.read().await.coupon_by_code(code).cloned())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.order_number() == number)
            .cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn upsert_coupon(&self, mut coupon: Coupon) -> Result<()> {
        coupon.code = normalize_code(&coupon.code);
        let mut state = self.state.write().await;
        if state
            .coupons
            .values()
            .any(|c| c.code == coupon.code && c.id != coupon.id)
        {
            return Err(StoreError::DuplicateCouponCode);
        }
        state.coupons.insert(coupon.id, coupon);
        Ok(())
    }

    async fn put_cart(&self, user_id: UserId, lines: Vec<CartLine>) -> Result<()> {
        self.state.write().await.carts.insert(user_id, lines);
        Ok(())
    }

    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<State>,
    working: State,
    faults: Arc<RwLock<Faults>>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn product(&mut self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(id).cloned())
    }

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.working.coupon_by_code(code).cloned())
    }

    async fn reserve_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Reservation> {
        let product = self.working.product_mut(id)?;
        if product.stock < quantity {
            return Ok(Reservation::Insufficient {
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(Reservation::Reserved)
    }

    async fn release_stock(&mut self, id: &ProductId, quantity: u32) -> Result<()> {
        let product = self.working.product_mut(id)?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }

    async fn redeem_coupon(&mut self, id: CouponId) -> Result<bool> {
        {
            let mut faults = self.faults.write().await;
            if faults.lost_redemptions > 0 {
                faults.lost_redemptions -= 1;
                let rival = self.guard.coupon_mut(id)?;
                rival.used_count = rival.usage_limit.unwrap_or(rival.used_count + 1);
                let used = rival.used_count;
                self.working.coupon_mut(id)?.used_count = used;
                return Ok(false);
            }
        }

        let coupon = self.working.coupon_mut(id)?;
        if !coupon.has_remaining_uses() {
            return Ok(false);
        }
        coupon.used_count += 1;
        Ok(true)
    }

    async fn unredeem_coupon(&mut self, id: CouponId) -> Result<()> {
        let coupon = self.working.coupon_mut(id)?;
        coupon.used_count = coupon.used_count.saturating_sub(1);
        Ok(())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let orders = &self.working.orders;
        if orders
            .values()
            .any(|o| o.order_number() == order.order_number())
        {
            return Err(StoreError::DuplicateOrderNumber);
        }
        if orders.contains_key(&order.id()) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id()
            )));
        }
        self.working.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        match self.working.orders.get_mut(&order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("unknown order {}", order.id()))),
        }
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<()> {
        self.working.carts.remove(&user_id);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        {
            let mut faults = self.faults.write().await;
            if faults.conflicts_remaining > 0 {
                faults.conflicts_remaining -= 1;
                return Err(StoreError::Conflict("injected commit conflict".to_string()));
            }
            if faults.fail_on_commit {
                return Err(StoreError::Unavailable("commit refused".to_string()));
            }
        }

        let InMemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::{Discount, Money};

    use super::*;

    fn product(id: &str, stock: u32) -> Product {
        Product::new(id, "Widget", Money::from_cents(1000), stock)
    }

    fn capped_coupon(limit: u32) -> Coupon {
        let mut coupon = Coupon::new("once", Discount::FreeShipping);
        coupon.usage_limit = Some(limit);
        coupon
    }

    #[tokio::test]
    async fn test_reserve_is_conditional() {
        let store = InMemoryStore::new();
        store.upsert_product(product("P", 1)).await.unwrap();
        let id = ProductId::from("P");

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.reserve_stock(&id, 1).await.unwrap(), Reservation::Reserved);
        assert_eq!(
            tx.reserve_stock(&id, 1).await.unwrap(),
            Reservation::Insufficient { available: 0 }
        );
        tx.commit().await.unwrap();

        assert_eq!(store.product(&id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        store.upsert_product(product("P", 3)).await.unwrap();
        let id = ProductId::from("P");

        {
            let mut tx = store.begin().await.unwrap();
            tx.reserve_stock(&id, 2).await.unwrap();
        }

        assert_eq!(store.product(&id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let store = InMemoryStore::new();
        store.upsert_product(product("P", 3)).await.unwrap();
        store.set_fail_on_commit(true).await;
        let id = ProductId::from("P");

        let mut tx = store.begin().await.unwrap();
        tx.reserve_stock(&id, 2).await.unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(StoreError::Unavailable(_))
        ));

        assert_eq!(store.product(&id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = InMemoryStore::new();
        store.inject_commit_conflicts(1).await;

        let tx = store.begin().await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Conflict(_))));

        let tx = store.begin().await.unwrap();
        assert!(tx.commit().await.is_ok());
    }

    #[tokio::test]
    async fn test_coupon_redemption_respects_cap() {
        let store = InMemoryStore::new();
        let coupon = capped_coupon(1);
        let id = coupon.id;
        store.upsert_coupon(coupon).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.redeem_coupon(id).await.unwrap());
        assert!(!tx.redeem_coupon(id).await.unwrap());
        tx.unredeem_coupon(id).await.unwrap();
        tx.unredeem_coupon(id).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.coupon_by_code("ONCE").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 0);
    }

    #[tokio::test]
    async fn test_lost_redemption_keeps_rival_use_after_rollback() {
        let store = InMemoryStore::new();
        let coupon = capped_coupon(1);
        let id = coupon.id;
        store.upsert_coupon(coupon).await.unwrap();
        store.inject_lost_redemptions(1).await;

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.redeem_coupon(id).await.unwrap());
        drop(tx);

        let stored = store.coupon_by_code("ONCE").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.redeem_coupon(id).await.unwrap());
        tx.commit().await.unwrap();
        let stored = store.coupon_by_code("ONCE").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
    }

    #[tokio::test]
    async fn test_coupon_lookup_is_case_insensitive() {
        let store = InMemoryStore::new();
        store.upsert_coupon(capped_coupon(5)).await.unwrap();

        assert!(store.coupon_by_code("  once ").await.unwrap().is_some());
        assert!(store.coupon_by_code("twice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_coupon_code_rejected() {
        let store = InMemoryStore::new();
        store.upsert_coupon(capped_coupon(5)).await.unwrap();

        let result = store.upsert_coupon(capped_coupon(9)).await;
        assert!(matches!(result, Err(StoreError::DuplicateCouponCode)));
    }

    #[tokio::test]
    async fn test_cart_round_trip_and_clear() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        store
            .put_cart(user, vec![CartLine::new("P", 2)])
            .await
            .unwrap();
        assert_eq!(store.cart(user).await.unwrap().len(), 1);

        let mut tx = store.begin().await.unwrap();
        tx.clear_cart(user).await.unwrap();
        tx.clear_cart(user).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.cart(user).await.unwrap().is_empty());
    }
}
