use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Malformed caller input, rejected before any upstream call.
    ValidationError(String),
    /// Upstream credentials are missing or unusable.
    ConfigurationError(String),
    /// Non-2xx, malformed or timed-out upstream response.
    UpstreamError {
        /// Message supplied by the upstream service, safe to show callers.
        message: Option<String>,
        /// Full description for the logs.
        detail: String,
    },
    /// Illegal fulfillment transition.
    PreconditionError(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Builds an `UpstreamError` without an upstream-provided message.
    pub fn upstream(detail: impl Into<String>) -> Self {
        AppError::UpstreamError {
            message: None,
            detail: detail.into(),
        }
    }

    /// Strips `WithContext` wrappers and returns the underlying error.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Short error-kind description shown to callers in place of internals.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            AppError::DatabaseError(_) => "Database error",
            AppError::NotFound(_) => "Not found",
            AppError::ValidationError(_) => "Validation error",
            AppError::ConfigurationError(_) => "Service not configured",
            AppError::UpstreamError { .. } => "Upstream service error",
            AppError::PreconditionError(_) => "Precondition failed",
            AppError::InternalError(_) => "Internal server error",
            AppError::WithContext { .. } => "Internal server error",
        }
    }

    /// Message that may be exposed to the end caller, if any.
    pub fn public_message(&self) -> Option<String> {
        match self.root() {
            AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::ConfigurationError(msg)
            | AppError::PreconditionError(msg) => Some(msg.clone()),
            AppError::UpstreamError { message, .. } => message.clone(),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::UpstreamError { detail, .. } => write!(f, "Upstream error: {}", detail),
            AppError::PreconditionError(msg) => write!(f, "Precondition failed: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and a
    /// `{success: false, error, message?}` body. Server-side details are
    /// logged, never returned.
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigurationError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::UpstreamError { detail, .. } => {
                tracing::error!("Upstream error: {}", detail);
                StatusCode::BAD_GATEWAY
            }
            AppError::PreconditionError(msg) => {
                tracing::warn!("Rejected transition: {}", msg);
                StatusCode::CONFLICT
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let mut body = json!({
            "success": false,
            "error": self.kind(),
        });
        if let Some(message) = self.public_message() {
            body["message"] = json!(message);
        }

        (status, Json(body)).into_response()
    }
}

// Make AppError cloneable for WithContext variant
impl Clone for AppError {
    /// Clones the error.
    ///
    /// Note: `sqlx::Error` is not cloneable, so `DatabaseError` is simplified to `RowNotFound` during cloning.
    fn clone(&self) -> Self {
        match self {
            AppError::DatabaseError(_e) => AppError::DatabaseError(sqlx::Error::RowNotFound),
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::ValidationError(msg) => AppError::ValidationError(msg.clone()),
            AppError::ConfigurationError(msg) => AppError::ConfigurationError(msg.clone()),
            AppError::UpstreamError { message, detail } => AppError::UpstreamError {
                message: message.clone(),
                detail: detail.clone(),
            },
            AppError::PreconditionError(msg) => AppError::PreconditionError(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    ///
    /// Timeouts, connection failures and body decoding failures all count as
    /// upstream failures.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::upstream(format!("request timed out: {}", err))
        } else {
            AppError::upstream(err.to_string())
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Arguments
    ///
    /// * `f` - A closure that produces the context message.
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}
