use crate::circuit_breaker::{create_db_circuit_breaker, DbCircuitBreaker};
use crate::errors::AppError;
use crate::fulfillment::CourierFulfillment;
use crate::models::{FraudCheckResult, Order};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker as _;
use sqlx::types::Json;
use sqlx::PgPool;
use std::future::Future;

/// Access to the order records owned by the storefront.
///
/// This service reads an order, proposes field updates on the returned copy
/// and hands it back through [`OrderStore::save`].
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, AppError>;

    /// Persists the fraud-check and courier fields of `order`.
    ///
    /// Must refuse to replace a consignment id that is already stored with a
    /// different one, reporting `PreconditionError`.
    async fn save(&self, order: &Order) -> Result<(), AppError>;
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    invoice: String,
    customer_name: String,
    phone: String,
    shipping_address: String,
    total: BigDecimal,
    note: Option<String>,
    fraud_checked: bool,
    fraud_check_result: Option<serde_json::Value>,
    fraud_check_at: Option<DateTime<Utc>>,
    steadfast_consignment_id: Option<i64>,
    steadfast_tracking_code: Option<String>,
    steadfast_status: Option<String>,
    steadfast_sent_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let order_id = row.id;
        let fraud_check_result = row.fraud_check_result.and_then(|value| {
            serde_json::from_value::<FraudCheckResult>(value)
                .map_err(|e| {
                    tracing::warn!(
                        "Ignoring unreadable fraud_check_result on order {}: {}",
                        order_id,
                        e
                    );
                })
                .ok()
        });

        Order {
            id: row.id,
            invoice: row.invoice,
            customer_name: row.customer_name,
            phone: row.phone,
            shipping_address: row.shipping_address,
            total: row.total,
            note: row.note,
            fraud_checked: row.fraud_checked,
            fraud_check_result,
            fraud_check_at: row.fraud_check_at,
            courier: CourierFulfillment {
                consignment_id: row.steadfast_consignment_id,
                tracking_code: row.steadfast_tracking_code,
                delivery_status: row.steadfast_status,
                sent_at: row.steadfast_sent_at,
            },
        }
    }
}

/// Postgres-backed order store.
pub struct PgOrderStore {
    pool: PgPool,
    breaker: DbCircuitBreaker,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breaker: create_db_circuit_breaker(),
        }
    }

    async fn guarded<T, F>(&self, operation: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
        T: Send,
    {
        match self.breaker.call(fut).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => {
                tracing::error!("Order store {} failed: {:?}", operation, e);
                Err(AppError::DatabaseError(e))
            }
            Err(failsafe::Error::Rejected) => {
                tracing::error!("Order store circuit open, rejecting {}", operation);
                Err(AppError::InternalError(format!(
                    "order store unavailable ({})",
                    operation
                )))
            }
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, AppError> {
        let row = self
            .guarded(
                "find_order",
                sqlx::query_as::<_, OrderRow>(
                    r#"
                    SELECT id, invoice, customer_name, phone, shipping_address, total, note,
                           fraud_checked, fraud_check_result, fraud_check_at,
                           steadfast_consignment_id, steadfast_tracking_code,
                           steadfast_status, steadfast_sent_at
                    FROM orders
                    WHERE id = $1
                    "#,
                )
                .bind(order_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(Order::from))
    }

    async fn save(&self, order: &Order) -> Result<(), AppError> {
        // Conditional write: a consignment id, once stored, is never replaced.
        let result = self
            .guarded(
                "save",
                sqlx::query(
                    r#"
                    UPDATE orders SET
                        fraud_checked = $2,
                        fraud_check_result = $3,
                        fraud_check_at = $4,
                        steadfast_consignment_id = $5,
                        steadfast_tracking_code = $6,
                        steadfast_status = $7,
                        steadfast_sent_at = $8,
                        updated_at = NOW()
                    WHERE id = $1
                      AND (steadfast_consignment_id IS NULL OR steadfast_consignment_id = $5)
                    "#,
                )
                .bind(order.id)
                .bind(order.fraud_checked)
                .bind(order.fraud_check_result.as_ref().map(Json))
                .bind(order.fraud_check_at)
                .bind(order.courier.consignment_id)
                .bind(order.courier.tracking_code.as_deref())
                .bind(order.courier.delivery_status.as_deref())
                .bind(order.courier.sent_at)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            let exists = self
                .guarded(
                    "save_check",
                    sqlx::query_scalar::<_, i64>("SELECT id FROM orders WHERE id = $1")
                        .bind(order.id)
                        .fetch_optional(&self.pool),
                )
                .await?;

            return Err(match exists {
                Some(_) => AppError::PreconditionError(format!(
                    "Order {} was dispatched concurrently by another request",
                    order.id
                )),
                None => AppError::NotFound(format!("Order {} not found", order.id)),
            });
        }

        tracing::debug!("Order {} saved", order.id);
        Ok(())
    }
}
