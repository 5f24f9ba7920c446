//! Use cases tying the upstream clients, the normalizer and the fulfillment
//! state machine to the order store.
//!
//! Every operation is request-scoped: credentials are resolved and clients
//! built per call, and nothing about an assessment or a fulfillment is kept in
//! memory between calls. The only shared state is the per-order lock table.

use crate::courier_client::{ConsignmentReceipt, CreateOrderParams, DeliveryType, SteadfastClient};
use crate::credentials::{CredentialSource, ServiceCredentials, ServiceModule};
use crate::errors::{AppError, ResultExt};
use crate::fraud_client::FraudCheckClient;
use crate::fulfillment::StatusLookup;
use crate::models::{BalanceResponse, CourierStatusResponse, FraudCheckResult, Order};
use crate::normalizer::normalize;
use crate::order_locks::{OrderLockGuard, OrderLocks};
use crate::order_store::OrderStore;
use crate::risk::RiskAssessment;
use crate::validation::{phone_fingerprint, validate_bd_phone, validate_order_id};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub struct RiskCourierService {
    orders: Arc<dyn OrderStore>,
    credentials: Arc<dyn CredentialSource>,
    upstream_timeout: Duration,
    /// Guard check, upstream call and save for the same order run one at a
    /// time.
    order_locks: OrderLocks,
}

impl RiskCourierService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        credentials: Arc<dyn CredentialSource>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            orders,
            credentials,
            upstream_timeout,
            order_locks: OrderLocks::new(),
        }
    }

    /// Looks up and classifies the delivery history of `phone`.
    ///
    /// Nothing is persisted; each call is an independent snapshot.
    pub async fn check_risk(&self, phone: &str) -> Result<RiskAssessment, AppError> {
        let phone = validate_bd_phone(phone)?;

        let creds = self.resolve_credentials(ServiceModule::FraudChecker).await?;
        let client = FraudCheckClient::new(&creds, self.upstream_timeout)?;

        let payload = client.lookup(&phone).await?;
        if !payload.success {
            tracing::warn!(
                "Fraud check for {} reported failure in body",
                phone_fingerprint(&phone)
            );
            return Err(AppError::UpstreamError {
                message: payload.upstream_message(),
                detail: format!("Fraud check reported failure: {}", payload.body),
            });
        }

        let assessment = normalize(&phone, &payload.body);
        tracing::info!(
            "Fraud check for {}: {} (ratio {:?})",
            phone_fingerprint(&phone),
            assessment.risk_tier().as_str(),
            assessment.success_ratio
        );
        Ok(assessment)
    }

    /// Runs a fraud check for an order's phone number and stores the result on
    /// the order, replacing any earlier one.
    ///
    /// When the upstream fails the order is still marked as checked, with a
    /// failure record, and the error is returned.
    pub async fn check_order_risk(&self, order_id: i64) -> Result<FraudCheckResult, AppError> {
        let order_id = validate_order_id(order_id)?;
        let _guard = self.lock_order(order_id).await;
        let mut order = self.load_order(order_id).await?;

        match self.check_risk(&order.phone).await {
            Ok(assessment) => {
                let result = FraudCheckResult::assessed(assessment);
                order.record_fraud_check(result.clone());
                self.orders
                    .save(&order)
                    .await
                    .with_context(|| format!("storing fraud check on order {}", order_id))?;
                tracing::info!("Order {} fraud check stored", order_id);
                Ok(result)
            }
            Err(err) if matches!(err.root(), AppError::UpstreamError { .. }) => {
                order.record_fraud_check(FraudCheckResult::failed(&err, Utc::now()));
                if let Err(save_err) = self.orders.save(&order).await {
                    tracing::error!(
                        "Failed to store fraud check failure on order {}: {}",
                        order_id,
                        save_err
                    );
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Hands an order to the courier. Rejected without contacting the courier
    /// when the order already has a consignment.
    pub async fn dispatch_to_courier(
        &self,
        order_id: i64,
        delivery_type: DeliveryType,
    ) -> Result<ConsignmentReceipt, AppError> {
        let order_id = validate_order_id(order_id)?;
        let _guard = self.lock_order(order_id).await;
        let mut order = self.load_order(order_id).await?;

        order.courier.ensure_dispatchable(order_id)?;
        let params = create_order_params(&order, delivery_type)?;

        let creds = self.resolve_credentials(ServiceModule::Steadfast).await?;
        let client = SteadfastClient::new(&creds, self.upstream_timeout)?;

        let receipt = client.create_order(&params).await?;
        order
            .courier
            .record_dispatch(order_id, &receipt, Utc::now())?;

        if let Err(err) = self.orders.save(&order).await {
            // The consignment exists at the courier but is not recorded here.
            tracing::error!(
                "Order {} dispatched as consignment {} ({}) but saving failed: {}",
                order_id,
                receipt.consignment_id,
                receipt.tracking_code,
                err
            );
            return Err(err);
        }

        Ok(receipt)
    }

    /// Fetches the latest delivery status of a dispatched order and stores it.
    pub async fn refresh_courier_status(
        &self,
        order_id: i64,
    ) -> Result<CourierStatusResponse, AppError> {
        let order_id = validate_order_id(order_id)?;
        let _guard = self.lock_order(order_id).await;
        let mut order = self.load_order(order_id).await?;

        let lookup = order.courier.status_lookup(order_id)?;

        let creds = self.resolve_credentials(ServiceModule::Steadfast).await?;
        let client = SteadfastClient::new(&creds, self.upstream_timeout)?;

        let delivery_status = match &lookup {
            StatusLookup::TrackingCode(code) => client.status_by_tracking_code(code).await?,
            StatusLookup::ConsignmentId(id) => client.status_by_consignment_id(*id).await?,
        };

        order
            .courier
            .record_status(order_id, delivery_status.clone())?;
        self.orders
            .save(&order)
            .await
            .with_context(|| format!("storing delivery status on order {}", order_id))?;

        Ok(CourierStatusResponse {
            delivery_status,
            tracking_code: order.courier.tracking_code.clone(),
        })
    }

    /// Current balance of the courier account.
    pub async fn courier_balance(&self) -> Result<BalanceResponse, AppError> {
        let creds = self.resolve_credentials(ServiceModule::Steadfast).await?;
        let client = SteadfastClient::new(&creds, self.upstream_timeout)?;
        let current_balance = client.balance().await?;
        Ok(BalanceResponse { current_balance })
    }

    async fn resolve_credentials(
        &self,
        module: ServiceModule,
    ) -> Result<ServiceCredentials, AppError> {
        self.credentials
            .credentials(module)
            .await
            .with_context(|| format!("resolving {} credentials", module))
    }

    async fn load_order(&self, order_id: i64) -> Result<Order, AppError> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn lock_order(&self, order_id: i64) -> OrderLockGuard {
        self.order_locks.acquire(order_id).await
    }
}

fn create_order_params(
    order: &Order,
    delivery_type: DeliveryType,
) -> Result<CreateOrderParams, AppError> {
    let recipient_phone = validate_bd_phone(&order.phone)?;
    if order.customer_name.trim().is_empty() {
        return Err(AppError::ValidationError(format!(
            "Order {} has no recipient name",
            order.id
        )));
    }
    if order.shipping_address.trim().is_empty() {
        return Err(AppError::ValidationError(format!(
            "Order {} has no shipping address",
            order.id
        )));
    }

    Ok(CreateOrderParams {
        invoice: order.invoice.clone(),
        recipient_name: order.customer_name.trim().to_string(),
        recipient_phone,
        recipient_address: order.shipping_address.trim().to_string(),
        cod_amount: order.total.clone(),
        note: order.note.clone(),
        delivery_type,
    })
}
