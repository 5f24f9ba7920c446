use crate::courier_client::ConsignmentReceipt;
use crate::errors::AppError;
use crate::models::*;
use crate::orchestrator::RiskCourierService;
use crate::validation::validate_order_id;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Fraud-check and courier use cases.
    pub service: RiskCourierService,
}

/// The `/api/v1` routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Fraud check endpoints
        .route("/api/v1/check-fraud", post(check_fraud))
        .route("/api/v1/orders/:id/fraud-check", post(check_order_fraud))
        // Courier endpoints
        .route("/api/v1/orders/:id/courier/dispatch", post(dispatch_order))
        .route("/api/v1/orders/:id/courier/status", post(refresh_order_status))
        .route("/api/v1/courier/balance", get(courier_balance))
}

/// Health check endpoint.
///
/// Returns the service status and version. Reports 503 when the order
/// database cannot be reached.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!("Health check: database unreachable: {}", e);
            "down"
        }
    };
    let status = if database == "up" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database == "up" { "healthy" } else { "degraded" },
            "service": "rust-courier-risk-api",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database
        })),
    )
}

/// POST /api/v1/check-fraud
///
/// Ad-hoc fraud check for a phone number. The result is not stored anywhere.
pub async fn check_fraud(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckFraudRequest>,
) -> Result<Json<FraudCheckResult>, AppError> {
    tracing::info!("POST /check-fraud");

    let assessment = state.service.check_risk(&payload.phone).await?;
    Ok(Json(FraudCheckResult::assessed(assessment)))
}

/// POST /api/v1/orders/:id/fraud-check
///
/// Runs a fraud check for the order's phone number and stores the result on
/// the order, replacing any earlier result.
pub async fn check_order_fraud(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Result<Json<FraudCheckResult>, AppError> {
    let order_id = validate_order_id(order_id)?;
    tracing::info!("POST /orders/{}/fraud-check", order_id);

    let result = state.service.check_order_risk(order_id).await?;
    Ok(Json(result))
}

/// POST /api/v1/orders/:id/courier/dispatch
///
/// Creates a Steadfast consignment for the order. Answers 409 when the order
/// already has one; the courier is not contacted in that case.
pub async fn dispatch_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
    body: Bytes,
) -> Result<Json<ConsignmentReceipt>, AppError> {
    let order_id = validate_order_id(order_id)?;
    // An empty body means a home delivery.
    let request: DispatchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DispatchRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::ValidationError(format!("Invalid dispatch request: {}", e)))?
    };
    let delivery_type = request.delivery_type;
    tracing::info!(
        "POST /orders/{}/courier/dispatch ({:?})",
        order_id,
        delivery_type
    );

    let receipt = state
        .service
        .dispatch_to_courier(order_id, delivery_type)
        .await?;

    Ok(Json(receipt))
}

/// POST /api/v1/orders/:id/courier/status
///
/// Refreshes and stores the courier's delivery status for a dispatched order.
pub async fn refresh_order_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Result<Json<CourierStatusResponse>, AppError> {
    let order_id = validate_order_id(order_id)?;
    tracing::info!("POST /orders/{}/courier/status", order_id);

    let status = state.service.refresh_courier_status(order_id).await?;
    Ok(Json(status))
}

/// GET /api/v1/courier/balance
pub async fn courier_balance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.service.courier_balance().await?;
    Ok(Json(balance))
}
