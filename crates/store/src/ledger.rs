//! Inventory ledger operations spanning several products.
//!
//! Products are always touched in ascending id order so two transactions
//! over overlapping products lock rows in the same sequence.

use std::collections::BTreeMap;

use common::ProductId;
use domain::OrderLineItem;

use crate::{Reservation, Result, StoreTransaction};

/// A product that could not cover its requested quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub requested: u32,
    pub available: u32,
}

/// Reserves every quantity inside `tx`.
///
/// Stops at the first product that cannot be covered and reports it. The
/// caller must then drop the transaction so earlier reservations roll back.
pub async fn reserve_all<T>(
    tx: &mut T,
    quantities: &BTreeMap<ProductId, u32>,
) -> Result<Option<Shortfall>>
where
    T: StoreTransaction + ?Sized,
{
    for (product_id, &requested) in quantities {
        if let Reservation::Insufficient { available } =
            tx.reserve_stock(product_id, requested).await?
        {
            return Ok(Some(Shortfall {
                product_id: product_id.clone(),
                requested,
                available,
            }));
        }
    }
    Ok(None)
}

/// Returns every line item's quantity to stock inside `tx`.
pub async fn release_all<T>(tx: &mut T, items: &[OrderLineItem]) -> Result<()>
where
    T: StoreTransaction + ?Sized,
{
    for (product_id, quantity) in quantities_by_product(items) {
        tx.release_stock(&product_id, quantity).await?;
    }
    Ok(())
}

/// Sums line quantities per product.
pub fn quantities_by_product(items: &[OrderLineItem]) -> BTreeMap<ProductId, u32> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.product_id.clone()).or_insert(0) += item.quantity;
    }
    totals
}

#[cfg(test)]
mod tests {
    use domain::{Money, Product};

    use super::*;
    use crate::{FulfillmentStore, InMemoryStore};

    async fn store_with(products: &[(&str, u32)]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for (id, stock) in products {
            store
                .upsert_product(Product::new(*id, *id, Money::from_cents(100), *stock))
                .await
                .unwrap();
        }
        store
    }

    async fn stock_of(store: &InMemoryStore, id: &str) -> u32 {
        store
            .product(&ProductId::from(id))
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[test]
    fn test_quantities_are_summed_per_product() {
        let product = Product::new("A", "A", Money::from_cents(100), 10);
        let items = vec![
            OrderLineItem::from_product(&product, 2, Some("red".to_string())),
            OrderLineItem::from_product(&product, 3, Some("blue".to_string())),
        ];
        let totals = quantities_by_product(&items);
        assert_eq!(totals.get(&ProductId::from("A")), Some(&5));
    }

    #[tokio::test]
    async fn test_shortfall_reported_and_rolled_back() {
        let store = store_with(&[("A", 5), ("B", 1)]).await;
        let quantities = BTreeMap::from([(ProductId::from("A"), 2), (ProductId::from("B"), 2)]);

        let mut tx = store.begin().await.unwrap();
        let shortfall = reserve_all(&mut tx, &quantities).await.unwrap();
        drop(tx);

        assert_eq!(
            shortfall,
            Some(Shortfall {
                product_id: ProductId::from("B"),
                requested: 2,
                available: 1,
            })
        );
        assert_eq!(stock_of(&store, "A").await, 5);
        assert_eq!(stock_of(&store, "B").await, 1);
    }

    #[tokio::test]
    async fn test_reserve_then_release_restores_stock() {
        let store = store_with(&[("A", 5)]).await;
        let product = store.product(&ProductId::from("A")).await.unwrap().unwrap();
        let items = vec![OrderLineItem::from_product(&product, 3, None)];

        let mut tx = store.begin().await.unwrap();
        assert!(
            reserve_all(&mut tx, &quantities_by_product(&items))
                .await
                .unwrap()
                .is_none()
        );
        tx.commit().await.unwrap();
        assert_eq!(stock_of(&store, "A").await, 2);

        let mut tx = store.begin().await.unwrap();
        release_all(&mut tx, &items).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(stock_of(&store, "A").await, 5);
    }
}
