use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, GatewayPaymentId, OrderId, VehicleId};
use domain::{
    Money, Order, OrderRecord, OrderStatus, Payment, PaymentStatus, StatusEntry, VehicleSnapshot,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderStore, StatusUpdate},
};

const ORDER_COLUMNS: &str = "id, customer_id, vehicle_id, vehicle_make, vehicle_model, \
     vehicle_year, vehicle_price_cents, vehicle_plate, total_cents, status, payment_status, \
     payment_id, created_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: &PgRow) -> Result<OrderRecord> {
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let payment_id: Option<String> = row.try_get("payment_id")?;

        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            vehicle: VehicleSnapshot {
                vehicle_id: VehicleId::new(row.try_get::<String, _>("vehicle_id")?),
                make: row.try_get("vehicle_make")?,
                model: row.try_get("vehicle_model")?,
                year: row.try_get("vehicle_year")?,
                price: Money::from_cents(row.try_get("vehicle_price_cents")?),
                plate: row.try_get("vehicle_plate")?,
            },
            total: Money::from_cents(row.try_get("total_cents")?),
            status: status.parse()?,
            payment_status: payment_status.parse()?,
            payment_id: payment_id.map(GatewayPaymentId::new),
            status_history: Vec::new(),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;

        Ok(Payment {
            gateway_payment_id: GatewayPaymentId::new(
                row.try_get::<String, _>("gateway_payment_id")?,
            ),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            vehicle_id: VehicleId::new(row.try_get::<String, _>("vehicle_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            status: status.parse()?,
            qr_code_link: row.try_get("qr_code_link")?,
            method: row.try_get("method")?,
            gateway: row.try_get("gateway")?,
            raw: row.try_get("raw")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Attaches the status history to each order row and rebuilds the aggregates.
    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut records = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>>>()?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = records.iter().map(|r| r.id.as_uuid()).collect();
        let history_rows = sqlx::query(
            r#"
            SELECT order_id, status, at
            FROM order_status_history
            WHERE order_id = ANY($1)
            ORDER BY order_id, seq ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut histories: HashMap<Uuid, Vec<StatusEntry>> = HashMap::new();
        for row in history_rows {
            let status: String = row.try_get("status")?;
            let at: DateTime<Utc> = row.try_get("at")?;
            histories
                .entry(row.try_get("order_id")?)
                .or_default()
                .push(StatusEntry::new(status.parse()?, at));
        }

        for record in &mut records {
            record.status_history = histories.remove(&record.id.as_uuid()).unwrap_or_default();
        }

        records
            .into_iter()
            .map(|record| Order::try_from(record).map_err(StoreError::from))
            .collect()
    }

    async fn fetch_orders(&self, sql: &str, bind: Option<&str>) -> Result<Vec<Order>> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.get_by_id(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    /// Locks the order row for the rest of the transaction and reads its
    /// status fields.
    async fn lock_order(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<LockedOrder> {
        let row = sqlx::query(
            "SELECT status, payment_status, payment_id FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;

        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let payment_id: Option<String> = row.try_get("payment_id")?;
        Ok(LockedOrder {
            status: status.parse()?,
            payment_status: payment_status.parse()?,
            has_payment_id: payment_id.is_some(),
        })
    }

    /// Checks a conditional update against the locked status.
    fn check_update(order_id: OrderId, actual: OrderStatus, update: &StatusUpdate) -> Result<()> {
        if actual != update.expected {
            metrics::counter!("order_store_conflicts_total").increment(1);
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected: update.expected,
                actual,
            });
        }
        actual.check_transition(update.target)?;
        Ok(())
    }

    async fn append_history(
        conn: &mut PgConnection,
        order_id: OrderId,
        update: &StatusUpdate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_status_history (order_id, seq, status, at)
            SELECT $1, COALESCE(MAX(seq), 0) + 1, $2, $3
            FROM order_status_history
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(update.target.as_str())
        .bind(update.at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn set_payment_status(
        conn: &mut PgConnection,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(payment_status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn upsert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (order_id, gateway_payment_id, vehicle_id, amount_cents, status,
                qr_code_link, method, gateway, raw, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_id) DO UPDATE SET
                gateway_payment_id = EXCLUDED.gateway_payment_id,
                vehicle_id = EXCLUDED.vehicle_id,
                amount_cents = EXCLUDED.amount_cents,
                status = EXCLUDED.status,
                qr_code_link = EXCLUDED.qr_code_link,
                method = EXCLUDED.method,
                gateway = EXCLUDED.gateway,
                raw = EXCLUDED.raw,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(payment.order_id.as_uuid())
        .bind(payment.gateway_payment_id.as_str())
        .bind(payment.vehicle_id.as_str())
        .bind(payment.amount.cents())
        .bind(payment.status.as_str())
        .bind(&payment.qr_code_link)
        .bind(&payment.method)
        .bind(&payment.gateway)
        .bind(&payment.raw)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

/// Status fields read under the row lock.
struct LockedOrder {
    status: OrderStatus,
    payment_status: PaymentStatus,
    has_payment_id: bool,
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn create(&self, order: &Order) -> Result<()> {
        let order_id = order.id();
        let vehicle = order.vehicle();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, vehicle_id, vehicle_make, vehicle_model,
                vehicle_year, vehicle_price_cents, vehicle_plate, total_cents, status,
                payment_status, payment_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(order.customer_id().as_str())
        .bind(vehicle.vehicle_id.as_str())
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.price.cents())
        .bind(&vehicle.plate)
        .bind(order.total().cents())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.payment_id().map(|id| id.as_str()))
        .bind(order.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order_id);
            }
            StoreError::Database(e)
        })?;

        for (seq, entry) in order.status_history().iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_status_history (order_id, seq, status, at) VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id.as_uuid())
            .bind(seq as i32 + 1)
            .bind(entry.status.as_str())
            .bind(entry.at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at ASC, id ASC"),
            None,
        )
        .await
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at ASC, id ASC"
            ),
            Some(status.as_str()),
        )
        .await
    }

    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, id DESC"
            ),
            Some(customer_id.as_str()),
        )
        .await
    }

    async fn list_active(&self) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE status NOT IN ('{}', '{}') ORDER BY created_at ASC, id ASC",
                OrderStatus::Completed.as_str(),
                OrderStatus::Cancelled.as_str(),
            ),
            None,
        )
        .await
    }

    #[tracing::instrument(skip_all, fields(order_id = %order_id, target = %update.target))]
    async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let actual = Self::lock_order(&mut tx, order_id).await?.status;
        Self::check_update(order_id, actual, &update)?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(update.target.as_str())
            .bind(update.at)
            .execute(&mut *tx)
            .await?;
        Self::append_history(&mut tx, order_id, &update).await?;

        tx.commit().await?;
        tracing::debug!(from = %actual, to = %update.target, "order status updated");

        self.load(order_id).await
    }

    async fn update_payment_status(
        &self,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET payment_status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .bind(payment_status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }

        sqlx::query("UPDATE payments SET status = $2, updated_at = $3 WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .bind(payment_status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.load(order_id).await
    }

    async fn update_payment_id(
        &self,
        order_id: OrderId,
        payment_id: &GatewayPaymentId,
    ) -> Result<Order> {
        let updated =
            sqlx::query("UPDATE orders SET payment_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(order_id.as_uuid())
                .bind(payment_id.as_str())
                .execute(&self.pool)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }

        self.load(order_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn claim_payment(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let locked = Self::lock_order(&mut tx, order_id).await?;
        if locked.status != OrderStatus::Reserved {
            metrics::counter!("order_store_conflicts_total").increment(1);
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected: OrderStatus::Reserved,
                actual: locked.status,
            });
        }
        if locked.payment_status != PaymentStatus::Pending {
            return Err(StoreError::PaymentAlreadyClaimed {
                order_id,
                payment_status: locked.payment_status,
            });
        }
        Self::set_payment_status(&mut tx, order_id, PaymentStatus::Processing).await?;

        tx.commit().await?;
        self.load(order_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn release_payment_claim(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let locked = Self::lock_order(&mut tx, order_id).await?;
        if locked.status == OrderStatus::Reserved
            && locked.payment_status == PaymentStatus::Processing
            && !locked.has_payment_id
        {
            Self::set_payment_status(&mut tx, order_id, PaymentStatus::Pending).await?;
        }

        tx.commit().await?;
        self.load(order_id).await
    }

    #[tracing::instrument(skip_all, fields(order_id = %payment.order_id, payment_id = %payment.gateway_payment_id))]
    async fn start_payment(&self, update: StatusUpdate, payment: &Payment) -> Result<Order> {
        let order_id = payment.order_id;
        let mut tx = self.pool.begin().await?;

        let actual = Self::lock_order(&mut tx, order_id).await?.status;
        Self::check_update(order_id, actual, &update)?;

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, payment_id = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(update.target.as_str())
        .bind(payment.status.as_str())
        .bind(payment.gateway_payment_id.as_str())
        .bind(update.at)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, order_id, &update).await?;
        Self::upsert_payment(&mut tx, payment).await?;

        tx.commit().await?;
        tracing::debug!(from = %actual, to = %update.target, "payment started");

        self.load(order_id).await
    }

    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, gateway_payment_id, vehicle_id, amount_cents, status, qr_code_link,
                method, gateway, raw, created_at, updated_at
            FROM payments
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }
}
