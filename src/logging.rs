//! # Structured Logging Module
//!
//! Environment-aware structured logging for mediation runs, plus helpers that
//! emit one structured event per batch and per failure.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A host may already own the global subscriber
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            log_level = %log_level,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    environment_from(|key| std::env::var(key).ok())
}

/// Resolve the environment name through `lookup`
fn environment_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup("BATCH_ITERATOR_ENV")
        .or_else(|| lookup("APP_ENV"))
        .unwrap_or_else(|| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for one batch submission
pub fn log_batch_operation(
    mediator_id: Option<&str>,
    message_id: &str,
    batch_index: usize,
    batch_count: usize,
    batch_len: usize,
    mode: &str,
    status: &str,
) {
    tracing::debug!(
        mediator_id = mediator_id,
        message_id = %message_id,
        batch = batch_index + 1,
        batch_count = batch_count,
        batch_len = batch_len,
        mode = %mode,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 BATCH_OPERATION"
    );
}

/// Log a mediation error with full context
pub fn log_mediation_error(
    mediator_id: Option<&str>,
    message_id: &str,
    operation: &str,
    error: &str,
) {
    tracing::error!(
        mediator_id = mediator_id,
        message_id = %message_id,
        operation = %operation,
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ MEDIATION_ERROR"
    );
}
