use std::collections::HashMap;

use async_trait::async_trait;
use common::{CouponId, OrderId, ProductId, UserId};
use domain::{
    Address, CartLine, Contact, Coupon, Discount, DiscountKind, Money, Order, OrderLineItem,
    OrderNumber, OrderParts, PriceBreakdown, Product, ProductSnapshot, normalize_code,
};
use sqlx::{
    PgExecutor, PgPool, Postgres, Row,
    postgres::{PgPoolOptions, PgRow},
    types::Json,
};
use uuid::Uuid;

use crate::{FulfillmentStore, Reservation, Result, StoreError, StoreTransaction};

const PRODUCT_COLUMNS: &str =
    "id, name, thumbnail, price_cents, discount_price_cents, stock, is_active";

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, max_discount_cents, \
     min_purchase_cents, usage_limit, used_count, valid_from, valid_until, status";

const ORDER_COLUMNS: &str = "id, order_number, user_id, subtotal_cents, discount_cents, \
     shipping_cents, tax_cents, total_cents, coupon_code, coupon_id, status, payment_status, \
     payment_method, shipping_address, billing_address, contact, customer_notes, admin_notes, \
     tracking_number, shipped_at, delivered_at, created_at, updated_at";

/// PostgreSQL-backed fulfillment store.
///
/// Stock and coupon counters are changed with conditional `UPDATE`s and
/// orders and coupons are row-locked inside transactions, so concurrent
/// service instances stay consistent.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FulfillmentStore for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
        sqlx::query(&sql)
            .bind(normalize_code(code))
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_coupon)
            .transpose()
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let Some(row) = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let items = fetch_items(&self.pool, id.as_uuid()).await?;
        row_to_order(row, items).map(Some)
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        let Some(row) = sqlx::query(&sql)
            .bind(number.as_str())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let id: Uuid = row.try_get("id")?;
        let items = fetch_items(&self.pool, id).await?;
        row_to_order(row, items).map(Some)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, variant_id, quantity, unit_price_cents, snapshot
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(ids.as_slice())
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
        for row in item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(row_to_line_item(row)?);
        }

        rows.into_iter()
            .zip(ids)
            .map(|(row, id)| row_to_order(row, items_by_order.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, thumbnail, price_cents, discount_price_cents, stock, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                thumbnail = EXCLUDED.thumbnail,
                price_cents = EXCLUDED.price_cents,
                discount_price_cents = EXCLUDED.discount_price_cents,
                stock = EXCLUDED.stock,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.thumbnail)
        .bind(product.price.cents())
        .bind(product.discount_price.map(|m| m.cents()))
        .bind(to_i32(product.stock, "stock")?)
        .bind(product.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_coupon(&self, coupon: Coupon) -> Result<()> {
        let (discount_type, discount_value, max_discount) = discount_columns(&coupon.discount);

        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, discount_type, discount_value, max_discount_cents,
                                 min_purchase_cents, usage_limit, used_count, valid_from, valid_until, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                discount_type = EXCLUDED.discount_type,
                discount_value = EXCLUDED.discount_value,
                max_discount_cents = EXCLUDED.max_discount_cents,
                min_purchase_cents = EXCLUDED.min_purchase_cents,
                usage_limit = EXCLUDED.usage_limit,
                used_count = EXCLUDED.used_count,
                valid_from = EXCLUDED.valid_from,
                valid_until = EXCLUDED.valid_until,
                status = EXCLUDED.status
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(normalize_code(&coupon.code))
        .bind(discount_type)
        .bind(discount_value)
        .bind(max_discount)
        .bind(coupon.min_purchase.map(|m| m.cents()))
        .bind(coupon.usage_limit.map(|l| to_i32(l, "usage_limit")).transpose()?)
        .bind(to_i32(coupon.used_count, "used_count")?)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_cart(&self, user_id: UserId, lines: Vec<CartLine>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (user_id, position, product_id, variant_id, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(position_of(position)?)
            .bind(line.product_id.as_str())
            .bind(&line.variant_id)
            .bind(to_i32(line.quantity, "quantity")?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, variant_id, quantity
            FROM cart_items
            WHERE user_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                    variant_id: row.try_get("variant_id")?,
                    quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                })
            })
            .collect()
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn product(&mut self, id: &ProductId) -> Result<Option<Product>> {
        fetch_product(&mut *self.tx, id).await
    }

    async fn coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 FOR UPDATE");
        sqlx::query(&sql)
            .bind(normalize_code(code))
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_coupon)
            .transpose()
    }

    async fn reserve_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Reservation> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Reservation::Reserved);
        }

        let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        match available {
            Some(stock) => Ok(Reservation::Insufficient {
                available: to_u32(stock, "stock")?,
            }),
            None => Err(StoreError::Corrupt(format!("unknown product {id}"))),
        }
    }

    async fn release_stock(&mut self, id: &ProductId, quantity: u32) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_str())
                .bind(i64::from(quantity))
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("unknown product {id}")));
        }
        Ok(())
    }

    async fn redeem_coupon(&mut self, id: CouponId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1
            WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unredeem_coupon(&mut self, id: CouponId) -> Result<()> {
        sqlx::query("UPDATE coupons SET used_count = GREATEST(used_count - 1, 0) WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };
        let items = fetch_items(&mut *self.tx, id.as_uuid()).await?;
        row_to_order(row, items).map(Some)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let totals = order.totals();

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, subtotal_cents, discount_cents, shipping_cents,
                                tax_cents, total_cents, coupon_code, coupon_id, status, payment_status,
                                payment_method, shipping_address, billing_address, contact, customer_notes,
                                admin_notes, tracking_number, shipped_at, delivered_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.user_id().as_uuid())
        .bind(totals.subtotal.cents())
        .bind(totals.discount.cents())
        .bind(totals.shipping.cents())
        .bind(totals.tax.cents())
        .bind(totals.total.cents())
        .bind(order.coupon_code())
        .bind(order.coupon_id().map(|id| id.as_uuid()))
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.payment_method().as_str())
        .bind(Json(order.shipping_address()))
        .bind(Json(order.billing_address()))
        .bind(Json(order.contact()))
        .bind(order.customer_notes())
        .bind(order.admin_notes())
        .bind(order.tracking_number())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, variant_id, quantity, unit_price_cents, snapshot)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position_of(position)?)
            .bind(item.product_id.as_str())
            .bind(&item.variant_id)
            .bind(to_i32(item.quantity, "quantity")?)
            .bind(item.unit_price.cents())
            .bind(Json(&item.snapshot))
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, tracking_number = $4, admin_notes = $5,
                shipped_at = $6, delivered_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.tracking_number())
        .bind(order.admin_notes())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("unknown order {}", order.id())));
        }
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

async fn fetch_product<'e, E>(executor: E, id: &ProductId) -> Result<Option<Product>>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(executor)
        .await?
        .map(row_to_product)
        .transpose()
}

async fn fetch_items<'e, E>(executor: E, order_id: Uuid) -> Result<Vec<OrderLineItem>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT product_id, variant_id, quantity, unit_price_cents, snapshot
        FROM order_items
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(row_to_line_item).collect()
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        thumbnail: row.try_get("thumbnail")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        discount_price: row
            .try_get::<Option<i64>, _>("discount_price_cents")?
            .map(Money::from_cents),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        is_active: row.try_get("is_active")?,
    })
}

fn row_to_coupon(row: PgRow) -> Result<Coupon> {
    let kind: DiscountKind = row
        .try_get::<String, _>("discount_type")?
        .parse()
        .map_err(StoreError::Corrupt)?;
    let value: i64 = row.try_get("discount_value")?;
    let max_discount = row
        .try_get::<Option<i64>, _>("max_discount_cents")?
        .map(Money::from_cents);

    let discount = match kind {
        DiscountKind::Percentage => Discount::Percentage {
            percent: u32::try_from(value)
                .map_err(|_| StoreError::Corrupt(format!("invalid percentage {value}")))?,
            max_discount,
        },
        DiscountKind::Fixed => Discount::Fixed {
            amount: Money::from_cents(value),
        },
        DiscountKind::FreeShipping => Discount::FreeShipping,
    };

    Ok(Coupon {
        id: CouponId::from_uuid(row.try_get("id")?),
        code: row.try_get("code")?,
        discount,
        min_purchase: row
            .try_get::<Option<i64>, _>("min_purchase_cents")?
            .map(Money::from_cents),
        usage_limit: row
            .try_get::<Option<i32>, _>("usage_limit")?
            .map(|limit| to_u32(limit, "usage_limit"))
            .transpose()?,
        used_count: to_u32(row.try_get("used_count")?, "used_count")?,
        valid_from: row.try_get("valid_from")?,
        valid_until: row.try_get("valid_until")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?,
    })
}

fn row_to_line_item(row: PgRow) -> Result<OrderLineItem> {
    let Json(snapshot): Json<ProductSnapshot> = row.try_get("snapshot")?;
    Ok(OrderLineItem {
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        variant_id: row.try_get("variant_id")?,
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        snapshot,
    })
}

fn row_to_order(row: PgRow, items: Vec<OrderLineItem>) -> Result<Order> {
    let Json(shipping_address): Json<Address> = row.try_get("shipping_address")?;
    let Json(billing_address): Json<Address> = row.try_get("billing_address")?;
    let Json(contact): Json<Contact> = row.try_get("contact")?;

    let order_number = OrderNumber::parse(&row.try_get::<String, _>("order_number")?)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(Order::from_parts(OrderParts {
        id: OrderId::from_uuid(row.try_get("id")?),
        order_number,
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        items,
        totals: PriceBreakdown {
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            discount: Money::from_cents(row.try_get("discount_cents")?),
            shipping: Money::from_cents(row.try_get("shipping_cents")?),
            tax: Money::from_cents(row.try_get("tax_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
        },
        coupon_code: row.try_get("coupon_code")?,
        coupon_id: row
            .try_get::<Option<Uuid>, _>("coupon_id")?
            .map(CouponId::from_uuid),
        status: parse_column(&row, "status")?,
        payment_status: parse_column(&row, "payment_status")?,
        payment_method: parse_column(&row, "payment_method")?,
        shipping_address,
        billing_address,
        contact,
        customer_notes: row.try_get("customer_notes")?,
        admin_notes: row.try_get("admin_notes")?,
        tracking_number: row.try_get("tracking_number")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    row.try_get::<String, _>(column)?
        .parse()
        .map_err(StoreError::Corrupt)
}

fn discount_columns(discount: &Discount) -> (&'static str, i64, Option<i64>) {
    let kind = discount.kind().as_str();
    match *discount {
        Discount::Percentage {
            percent,
            max_discount,
        } => (kind, i64::from(percent), max_discount.map(|m| m.cents())),
        Discount::Fixed { amount } => (kind, amount.cents(), None),
        Discount::FreeShipping => (kind, 0, None),
    }
}

fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field}: {value}")))
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

fn position_of(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| StoreError::Corrupt(format!("position out of range: {index}")))
}
