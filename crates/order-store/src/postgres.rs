use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Erid, Order, OrderPhoto, OrderStatus, Price};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{
        OrderFilter, OrderPatch, OrderStore, OrderWithPhotos, PurgeReport, validate_field_patch,
        validate_transition,
    },
};

const SCHEMA: &str = include_str!("../../../migrations/001_create_orders.sql");

const ORDER_COLUMNS: &str = "id, text, group_id, user_id, price, custom_erid, erid, status, \
     payment_id, post_id, last_error, created_at, paid_at, published_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    ///
    /// Call [`initialize`](Self::initialize) once at startup before use.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and creates the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.initialize().await?;
        Ok(store)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates tables and indexes if they do not exist yet.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("order store schema ready");
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let id: String = row.try_get("id")?;
        let corrupt = |reason: String| StoreError::Corrupt {
            order_id: id.clone(),
            reason,
        };

        let price: Decimal = row.try_get("price")?;
        let status: String = row.try_get("status")?;
        let custom_erid: Option<String> = row.try_get("custom_erid")?;
        let erid: Option<String> = row.try_get("erid")?;

        Ok(Order {
            id: OrderId::new(id.clone()),
            text: row.try_get("text")?,
            group_id: row.try_get("group_id")?,
            user_id: row.try_get("user_id")?,
            price: Price::new(price).map_err(|e| corrupt(e.to_string()))?,
            custom_erid: custom_erid
                .as_deref()
                .map(Erid::parse)
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
            erid: erid
                .as_deref()
                .map(Erid::parse)
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| corrupt(e.to_string()))?,
            payment_id: row.try_get("payment_id")?,
            post_id: row.try_get("post_id")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            paid_at: row.try_get("paid_at")?,
            published_at: row.try_get("published_at")?,
        })
    }

    fn row_to_photo(row: &PgRow) -> Result<OrderPhoto> {
        Ok(OrderPhoto {
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            filename: row.try_get("filename")?,
            mimetype: row.try_get("mimetype")?,
            storage_locator: row.try_get("storage_locator")?,
        })
    }

    /// Appends `SET col = $n, ...` for every `Some` field of the patch.
    fn push_patch(builder: &mut QueryBuilder<'_, Postgres>, patch: &OrderPatch) {
        let mut set = builder.separated(", ");
        if let Some(status) = patch.status {
            set.push("status = ");
            set.push_bind_unseparated(status.as_str());
        }
        if let Some(erid) = &patch.erid {
            // Written once
            set.push("erid = COALESCE(erid, ");
            set.push_bind_unseparated(erid.as_str().to_string());
            set.push_unseparated(")");
        }
        if let Some(payment_id) = &patch.payment_id {
            set.push("payment_id = ");
            set.push_bind_unseparated(payment_id.clone());
        }
        if let Some(post_id) = patch.post_id {
            set.push("post_id = ");
            set.push_bind_unseparated(post_id);
        }
        if let Some(reason) = &patch.last_error {
            set.push("last_error = ");
            set.push_bind_unseparated(reason.clone());
        }
        if let Some(at) = patch.paid_at {
            set.push("paid_at = ");
            set.push_bind_unseparated(at);
        }
        if let Some(at) = patch.published_at {
            set.push("published_at = ");
            set.push_bind_unseparated(at);
        }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, text, group_id, user_id, price, custom_erid, erid, status,
                                payment_id, post_id, last_error, created_at, paid_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_str())
        .bind(&order.text)
        .bind(order.group_id)
        .bind(order.user_id)
        .bind(order.price.amount())
        .bind(order.custom_erid.as_ref().map(Erid::as_str))
        .bind(order.erid.as_ref().map(Erid::as_str))
        .bind(order.status.as_str())
        .bind(&order.payment_id)
        .bind(order.post_id)
        .bind(&order.last_error)
        .bind(order.created_at)
        .bind(order.paid_at)
        .bind(order.published_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateOrder(order.id.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn insert_photo(&self, photo: &OrderPhoto) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_photos (order_id, filename, mimetype, storage_locator)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(photo.order_id.as_str())
        .bind(&photo.filename)
        .bind(&photo.mimetype)
        .bind(&photo.storage_locator)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::OrderNotFound(photo.order_id.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_order_with_photos(&self, id: &OrderId) -> Result<Option<OrderWithPhotos>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(&row)?;

        let photo_rows = sqlx::query(
            r#"
            SELECT order_id, filename, mimetype, storage_locator
            FROM order_photos
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let photos = photo_rows
            .iter()
            .map(Self::row_to_photo)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(OrderWithPhotos { order, photos }))
    }

    async fn update_order_fields(&self, id: &OrderId, patch: OrderPatch) -> Result<bool> {
        validate_field_patch(&patch)?;
        if patch.is_empty() {
            return Ok(false);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE orders SET ");
        Self::push_patch(&mut builder, &patch);
        builder.push(" WHERE id = ");
        builder.push_bind(id.as_str());

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_erid_once(&self, id: &OrderId, erid: &Erid) -> Result<Option<Erid>> {
        let stored: Option<String> = sqlx::query_scalar(
            "UPDATE orders SET erid = COALESCE(erid, $2) WHERE id = $1 RETURNING erid",
        )
        .bind(id.as_str())
        .bind(erid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        stored
            .as_deref()
            .map(Erid::parse)
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                order_id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Option<Order>> {
        validate_transition(expected, &patch)?;

        // The status guard in WHERE makes the update a compare-and-set
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE orders SET ");
        Self::push_patch(&mut builder, &patch);
        builder.push(" WHERE id = ");
        builder.push_bind(id.as_str());
        builder.push(" AND status = ");
        builder.push_bind(expected.as_str());
        builder.push(" RETURNING ");
        builder.push(ORDER_COLUMNS);

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1"
        ));

        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(group_id) = filter.group_id {
            builder.push(" AND group_id = ");
            builder.push_bind(group_id);
        }
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }

        builder.push(" ORDER BY created_at DESC");

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        let mut tx = self.pool.begin().await?;

        let photo_locators: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT p.storage_locator
            FROM order_photos p
            JOIN orders o ON o.id = p.order_id
            WHERE o.created_at < $1
            ORDER BY p.id ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        // Photos go with their orders via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PurgeReport {
            orders_deleted: result.rows_affected(),
            photo_locators,
        })
    }
}
