//! Error types for the gateway

use ledger_core::PaymentStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Booking is not in a state that accepts payment
    #[error("Booking not payable: {0}")]
    BookingNotPayable(Uuid),

    /// Booking already has a completed payment
    #[error("Booking already paid: {0}")]
    AlreadyPaid(Uuid),

    /// Webhook signature did not verify
    ///
    /// Deliberately carries no detail: signature failures must not give a
    /// probing sender feedback.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook payload did not map cleanly onto a known event
    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),

    /// Processor call failed or timed out; safe to retry
    #[error("Payment processor unavailable: {0}")]
    ProcessorUnavailable(String),

    /// Processor rejected the request
    #[error("Payment processor error: {0}")]
    Processor(String),

    /// Payment is not in a refundable state
    #[error("Payment {payment_id} not refundable in status {status:?}")]
    NotRefundable {
        /// Payment the refund targeted
        payment_id: Uuid,
        /// Its status at the time
        status: PaymentStatus,
    },

    /// Refund amount is out of range
    #[error("Invalid refund: {0}")]
    InvalidRefund(String),

    /// Booking collaborator failure
    #[error("Booking lookup failed: {0}")]
    Booking(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),
}
