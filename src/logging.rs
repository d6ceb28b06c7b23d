//! # Structured Logging Module
//!
//! Environment-aware structured logging for the reporting core. Console output is
//! human readable by default and switches to JSON lines when
//! `HANDPAY_LOG_FORMAT=json`, which is what the machine's log collector ingests.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::env as env_vars;
use crate::models::{ClientId, TransactionId};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format();

        let console_layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        // A global subscriber may already be installed by the host application
        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
            return;
        }

        tracing::info!(
            environment = %environment,
            log_level = %log_level,
            json_output = json,
            "Structured logging initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var(env_vars::ENVIRONMENT)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment variables or environment defaults
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        return level.to_lowercase();
    }

    if let Ok(level) = std::env::var("RUST_LOG") {
        return level.to_lowercase();
    }

    default_log_level(environment).to_string()
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var(env_vars::LOG_FORMAT)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for handpay lifecycle operations
pub fn log_handpay_operation(
    operation: &str,
    transaction_id: TransactionId,
    client_id: Option<ClientId>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        transaction_id = %transaction_id,
        client_id = client_id.map(|c| c.0),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "HANDPAY_OPERATION"
    );
}

/// Log structured data for per-client queue operations
pub fn log_queue_operation(
    operation: &str,
    client_id: ClientId,
    transaction_id: Option<TransactionId>,
    queue_len: usize,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        client_id = client_id.0,
        transaction_id = transaction_id.map(|t| t.0),
        queue_len = queue_len,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "QUEUE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
