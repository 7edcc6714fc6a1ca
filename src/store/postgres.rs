use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::customer::{Address, Customer, CustomerDirectory, CustomerId, Email, PhoneNumber};
use crate::domain::order::{Currency, Order, OrderId, OrderItem, OrderQuery, OrderStatus};
use crate::domain::product::{Product, ProductCatalog, ProductId};
use super::{OrderStore, SeedStore, StoreError};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Orders and their items live in two tables. Every multi-row write runs in a
// transaction, so an order is never visible with only some of its items, and
// order_items cascades on delete.
//
// customer_id carries no foreign key: an order outlives its customer.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        price NUMERIC NOT NULL,
        brand TEXT,
        category TEXT
    )",
    "CREATE TABLE IF NOT EXISTS customers (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT,
        street TEXT NOT NULL,
        postal_number TEXT NOT NULL,
        city TEXT NOT NULL,
        country TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        birth_date DATE
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        customer_id BIGINT,
        currency TEXT NOT NULL,
        order_date_utc TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS orders_order_date_utc_idx ON orders (order_date_utc)",
    "CREATE TABLE IF NOT EXISTS order_items (
        order_id UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        line_no INT NOT NULL,
        product_id BIGINT NOT NULL,
        quantity INT NOT NULL CHECK (quantity >= 1),
        price NUMERIC NOT NULL,
        PRIMARY KEY (order_id, line_no)
    )",
];

const WINDOW: &str = "($1::timestamptz IS NULL OR order_date_utc >= $1)
                  AND ($2::timestamptz IS NULL OR order_date_utc <= $2)";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(map_sqlx)?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create tables and indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
        }
        tracing::debug!(statements = SCHEMA.len(), "Schema ensured");
        Ok(())
    }

    async fn write_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (id, customer_id, currency, order_date_utc, status)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().map(|c| c.value()))
        .bind(order.currency().as_str())
        .bind(order.order_date_utc())
        .bind(order.status().as_str())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;

        for item in order.items() {
            sqlx::query(
                "INSERT INTO order_items (order_id, line_no, product_id, quantity, price)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id().as_uuid())
            .bind(to_i32(item.id, "line_no")?)
            .bind(item.product_id.value())
            .bind(to_i32(item.quantity, "quantity")?)
            .bind(item.price)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        }
        Ok(())
    }

    /// Attach items to order header rows, keeping header order.
    async fn hydrate(&self, headers: Vec<PgRow>) -> Result<Vec<Order>, StoreError> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = headers
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<_, _>>()?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        let mut rows = sqlx::query(
            "SELECT order_id, line_no, product_id, quantity, price
             FROM order_items
             WHERE order_id = ANY($1)
             ORDER BY order_id, line_no",
        )
        .bind(&ids)
        .fetch(&self.pool);

        while let Some(row) = rows.try_next().await.map_err(map_sqlx)? {
            let order_id: Uuid = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(item_from_row(&row)?);
        }

        headers
            .iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                let lines = items.remove(&id).unwrap_or_default();
                order_from_row(row, lines)
            })
            .collect()
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(e)
}

fn to_i32(value: u32, column: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", column, value)))
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let line_no: i32 = row.try_get("line_no")?;
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderItem {
        id: u32::try_from(line_no).map_err(|_| StoreError::Corrupt(format!("line_no {}", line_no)))?,
        product_id: ProductId(row.try_get("product_id")?),
        quantity: u32::try_from(quantity).map_err(|_| StoreError::Corrupt(format!("quantity {}", quantity)))?,
        price: row.try_get::<Decimal, _>("price")?,
    })
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let id: Uuid = row.try_get("id")?;
    if items.is_empty() {
        return Err(StoreError::Corrupt(format!("order {} has no items", id)));
    }

    let customer_id: Option<i64> = row.try_get("customer_id")?;
    let currency: String = row.try_get("currency")?;
    let status: String = row.try_get("status")?;
    let order_date_utc: DateTime<Utc> = row.try_get("order_date_utc")?;

    let order = Order::restore(
        OrderId(id),
        customer_id.map(CustomerId),
        Currency::parse(&currency).map_err(StoreError::Corrupt)?,
        order_date_utc,
        status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        items,
    );
    if order.checked_total().is_none() {
        return Err(StoreError::Corrupt(format!("order {} total overflows", id)));
    }
    Ok(order)
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        brand: row.try_get("brand")?,
        category: row.try_get("category")?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    let phone: Option<String> = row.try_get("phone")?;
    let birth_date: Option<NaiveDate> = row.try_get("birth_date")?;
    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: Email::new(row.try_get::<String, _>("email")?),
        phone: phone.map(PhoneNumber::new),
        address: Address {
            street: row.try_get("street")?,
            postal_number: row.try_get("postal_number")?,
            city: row.try_get("city")?,
            country: row.try_get("country")?,
        },
        created_at: row.try_get("created_at")?,
        birth_date,
    })
}

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, street, postal_number, city, country, created_at, birth_date";
const PRODUCT_COLUMNS: &str = "id, name, description, price, brand, category";

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        Self::write_order(&mut tx, order).await?;
        tx.commit().await.map_err(map_sqlx)?;

        tracing::debug!(order_id = %order.id(), item_count = order.items().len(), "Inserted order");
        Ok(())
    }

    async fn insert_batch(&self, orders: &[Order]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        for order in orders {
            Self::write_order(&mut tx, order).await?;
        }
        tx.commit().await.map_err(map_sqlx)?;

        tracing::debug!(order_count = orders.len(), "Inserted order batch");
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let header = sqlx::query(
            "SELECT id, customer_id, currency, order_date_utc, status FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match header {
            Some(row) => Ok(self.hydrate(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: OrderId, expected: OrderStatus, status: OrderStatus) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: &OrderQuery) -> Result<(Vec<Order>, u64), StoreError> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders WHERE {}", WINDOW))
            .bind(query.date_from)
            .bind(query.date_to)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let headers = sqlx::query(&format!(
            "SELECT id, customer_id, currency, order_date_utc, status
             FROM orders
             WHERE {}
             ORDER BY order_date_utc DESC, id ASC
             LIMIT $3 OFFSET $4",
            WINDOW
        ))
        .bind(query.date_from)
        .bind(query.date_to)
        .bind(query.limit() as i64)
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let orders = self.hydrate(headers).await?;
        Ok((orders, total.max(0) as u64))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl CustomerDirectory for PostgresStore {
    async fn find(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(customer_from_row).transpose()
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn find_many(&self, ids: &BTreeSet<ProductId>) -> Result<HashMap<ProductId, Product>, StoreError> {
        let wanted: Vec<i64> = ids.iter().map(ProductId::value).collect();
        let rows = sqlx::query(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
            .bind(&wanted)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| product_from_row(row).map(|p| (p.id, p)))
            .collect()
    }
}

#[async_trait]
impl SeedStore for PostgresStore {
    async fn product_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }

    async fn customer_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }

    async fn insert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        for product in products {
            sqlx::query(
                "INSERT INTO products (id, name, description, price, brand, category)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(product.id.value())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(&product.brand)
            .bind(&product.category)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_customers(&self, customers: &[Customer]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        for customer in customers {
            sqlx::query(
                "INSERT INTO customers
                    (id, name, email, phone, street, postal_number, city, country, created_at, birth_date)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(customer.id.value())
            .bind(&customer.name)
            .bind(customer.email.as_str())
            .bind(customer.phone.as_ref().map(PhoneNumber::as_str))
            .bind(&customer.address.street)
            .bind(&customer.address.postal_number)
            .bind(&customer.address.city)
            .bind(&customer.address.country)
            .bind(customer.created_at)
            .bind(customer.birth_date)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn first_product(&self) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM products ORDER BY id LIMIT 1", PRODUCT_COLUMNS))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn first_customer(&self) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM customers ORDER BY id LIMIT 1", CUSTOMER_COLUMNS))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(customer_from_row).transpose()
    }
}
