//! Structured observability hooks for client operations.
//!
//! Resource-level waits carry their own `#[instrument]` spans, so the
//! dispatch and convergence events below are recorded inside them.
//!
//! Events are emitted at `info!` level unless noted (configurable via
//! `RUST_LOG`). For JSON output, pass `--json` to `aemctl`.

use tracing::{debug, info, warn};

use crate::operation::Operation;

/// Emit event: operation handed to the transport (debug level).
pub fn emit_operation_called(operation: Operation) {
    debug!(event = "operation.called", operation = %operation);
}

/// Emit event: operation response handled.
pub fn emit_operation_completed(operation: Operation, status: u16, success: bool) {
    info!(
        event = "operation.completed",
        operation = %operation,
        status = status,
        success = success,
    );
}

/// Emit event: one convergence check finished.
///
/// # Example
///
/// ```ignore
/// emit_convergence_attempt("Install", 3, false, "Package g/p-1.0 is not installed");
/// // logs: event=convergence.attempt label=Install attempt=3 ready=false message=...
/// ```
pub fn emit_convergence_attempt(label: &str, attempt: u32, ready: bool, message: &str) {
    info!(
        event = "convergence.attempt",
        label = %label,
        attempt = attempt,
        ready = ready,
        message = %message,
    );
}

/// Emit event: convergence gave up (warning level).
pub fn emit_convergence_exhausted(label: &str, attempts: u32, message: &str) {
    warn!(
        event = "convergence.exhausted",
        label = %label,
        attempts = attempts,
        message = %message,
    );
}
