//! Courier Risk API Library
//!
//! Fraud-risk checks for customer phone numbers and Steadfast courier
//! fulfillment for storefront orders: upstream clients, payload
//! normalization, risk classification, the fulfillment state machine and the
//! HTTP handlers exposing them.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `circuit_breaker`: Circuit breaker around order-store calls.
//! - `config`: Configuration management.
//! - `courier_client`: Steadfast courier client.
//! - `credentials`: Upstream credential sources.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `fraud_client`: Risk-lookup client.
//! - `fulfillment`: Courier fulfillment state machine.
//! - `handlers`: HTTP request handlers.
//! - `models`: Orders, fraud-check records and API payloads.
//! - `normalizer`: Raw risk payload normalization.
//! - `orchestrator`: Fraud-check and courier use cases.
//! - `order_locks`: Per-order mutual exclusion.
//! - `order_store`: Order persistence.
//! - `risk`: Risk tiers and assessments.
//! - `validation`: Input validation.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod circuit_breaker;
pub mod config;
pub mod courier_client;
pub mod credentials;
pub mod db;
pub mod errors;
pub mod fraud_client;
pub mod fulfillment;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod order_locks;
pub mod order_store;
pub mod risk;
pub mod validation;
