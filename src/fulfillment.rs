//! Courier fulfillment lifecycle of an order.
//!
//! ```text
//! Unsent --dispatch--> Sent --refresh--> Tracked --refresh--> Tracked
//! ```
//!
//! The state is derived from the persisted fields, so there is no separate
//! state column to drift out of sync. Fields are only ever filled in or
//! overwritten, never cleared.

use crate::courier_client::ConsignmentReceipt;
use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentState {
    Unsent,
    Sent,
    Tracked,
}

/// How a status refresh identifies the consignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLookup {
    TrackingCode(String),
    ConsignmentId(i64),
}

/// Courier fields embedded in an order record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierFulfillment {
    pub consignment_id: Option<i64>,
    pub tracking_code: Option<String>,
    pub delivery_status: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl CourierFulfillment {
    pub fn state(&self) -> FulfillmentState {
        if !self.is_dispatched() {
            FulfillmentState::Unsent
        } else if self.delivery_status.is_some() {
            FulfillmentState::Tracked
        } else {
            FulfillmentState::Sent
        }
    }

    fn is_dispatched(&self) -> bool {
        self.consignment_id.is_some() || self.tracking_code.is_some()
    }

    /// Rejects a dispatch for an order that already has a consignment.
    ///
    /// Checked before the courier is contacted, independently of any
    /// idempotency the courier itself provides.
    pub fn ensure_dispatchable(&self, order_id: i64) -> Result<(), AppError> {
        if self.is_dispatched() {
            return Err(AppError::PreconditionError(format!(
                "Order {} was already dispatched (consignment {})",
                order_id,
                self.consignment_id
                    .map(|id| id.to_string())
                    .or_else(|| self.tracking_code.clone())
                    .unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// `Unsent -> Sent`: records the consignment created by the courier.
    pub fn record_dispatch(
        &mut self,
        order_id: i64,
        receipt: &ConsignmentReceipt,
        sent_at: DateTime<Utc>,
    ) -> Result<FulfillmentState, AppError> {
        self.ensure_dispatchable(order_id)?;

        self.consignment_id = Some(receipt.consignment_id);
        self.tracking_code = Some(receipt.tracking_code.clone());
        self.sent_at = Some(sent_at);

        tracing::info!(
            "Order {} fulfillment: unsent -> sent (consignment {})",
            order_id,
            receipt.consignment_id
        );
        Ok(self.state())
    }

    /// Picks the key for a status refresh, preferring the tracking code.
    ///
    /// Fails from `Unsent`, where neither key exists yet.
    pub fn status_lookup(&self, order_id: i64) -> Result<StatusLookup, AppError> {
        if let Some(code) = self.tracking_code.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(StatusLookup::TrackingCode(code.clone()));
        }
        if let Some(id) = self.consignment_id {
            return Ok(StatusLookup::ConsignmentId(id));
        }
        Err(AppError::PreconditionError(format!(
            "Order {} has not been dispatched to the courier",
            order_id
        )))
    }

    /// `Sent -> Tracked` and `Tracked -> Tracked`: stores the latest status.
    pub fn record_status(
        &mut self,
        order_id: i64,
        delivery_status: String,
    ) -> Result<FulfillmentState, AppError> {
        let from = self.state();
        if from == FulfillmentState::Unsent {
            return Err(AppError::PreconditionError(format!(
                "Order {} has not been dispatched to the courier",
                order_id
            )));
        }

        tracing::info!(
            "Order {} fulfillment: {:?} -> tracked ({})",
            order_id,
            from,
            delivery_status
        );
        self.delivery_status = Some(delivery_status);
        Ok(self.state())
    }
}
