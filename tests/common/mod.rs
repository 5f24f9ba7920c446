//! Shared fixtures: an in-memory order store with the Postgres store's
//! conditional-write rule, sample orders and upstream payloads.
#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rust_courier_risk_api::credentials::{ServiceCredentials, StaticCredentials};
use rust_courier_risk_api::errors::AppError;
use rust_courier_risk_api::fulfillment::CourierFulfillment;
use rust_courier_risk_api::models::Order;
use rust_courier_risk_api::orchestrator::RiskCourierService;
use rust_courier_risk_api::order_store::OrderStore;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Order store double with the same conditional-write rule as Postgres.
#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<i64, Order>>,
}

impl InMemoryOrders {
    pub fn with(orders: Vec<Order>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut map = store.orders.lock().unwrap();
            for order in orders {
                map.insert(order.id, order);
            }
        }
        Arc::new(store)
    }

    pub fn get(&self, id: i64) -> Order {
        self.orders.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, AppError> {
        Ok(self.orders.lock().unwrap().get(&order_id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<(), AppError> {
        let mut map = self.orders.lock().unwrap();
        let stored = map
            .get(&order.id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order.id)))?;
        if let Some(existing) = stored.courier.consignment_id {
            if order.courier.consignment_id != Some(existing) {
                return Err(AppError::PreconditionError("consignment changed".to_string()));
            }
        }
        map.insert(order.id, order.clone());
        Ok(())
    }
}

pub fn order(id: i64) -> Order {
    Order {
        id,
        invoice: format!("INV-{}", id),
        customer_name: "Rahim Uddin".to_string(),
        phone: "01774226088".to_string(),
        shipping_address: "House 12, Road 5, Dhanmondi, Dhaka".to_string(),
        total: BigDecimal::from(1250),
        note: None,
        fraud_checked: false,
        fraud_check_result: None,
        fraud_check_at: None,
        courier: CourierFulfillment::default(),
    }
}

pub fn dispatched_order(id: i64) -> Order {
    let mut order = order(id);
    order.courier = CourierFulfillment {
        consignment_id: Some(1424107),
        tracking_code: Some("15BAEB8A".to_string()),
        delivery_status: None,
        sent_at: Some(chrono::Utc::now()),
    };
    order
}

pub fn credentials(fraud_url: &str, courier_url: &str) -> StaticCredentials {
    StaticCredentials {
        fraud_checker: ServiceCredentials {
            api_key: Some("fraud-key".to_string()),
            secret_key: None,
            base_url: Some(fraud_url.to_string()),
        },
        steadfast: ServiceCredentials {
            api_key: Some("sf-key".to_string()),
            secret_key: Some("sf-secret".to_string()),
            base_url: Some(courier_url.to_string()),
        },
    }
}

pub fn service(store: Arc<InMemoryOrders>, creds: StaticCredentials) -> RiskCourierService {
    RiskCourierService::new(store, Arc::new(creds), Duration::from_secs(5))
}

pub fn pathao_payload(ratio: f64) -> serde_json::Value {
    json!({
        "courierData": {
            "Pathao": {
                "name": "Pathao",
                "total_parcel": 10,
                "success_parcel": 8,
                "cancelled_parcel": 2,
                "success_ratio": ratio
            }
        },
        "success_ratio": ratio,
        "total_orders": 10
    })
}

pub fn create_order_response() -> serde_json::Value {
    json!({
        "status": 200,
        "message": "Consignment has been created successfully.",
        "consignment": {
            "consignment_id": 1424107,
            "invoice": "INV-9",
            "tracking_code": "15BAEB8A",
            "recipient_name": "Rahim Uddin",
            "status": "in_review"
        }
    })
}
