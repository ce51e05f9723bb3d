//! Payment gateway adapter for the LessonPay ledger
//!
//! Sits at the boundary between the platform and the external payment
//! processor:
//!
//! - **Charges**: creates processor-side charges for payable bookings and
//!   mirrors them as `Pending` payments
//! - **Webhooks**: verifies callback authenticity, parses the loosely-typed
//!   payload into a typed event at the boundary, and applies paid/failed
//!   outcomes idempotently
//! - **Refunds**: refunds completed payments at the processor and records the
//!   outcome
//!
//! The processor and the booking service are consumed through traits; the
//! adapter never blocks a ledger lock on the network, and every processor
//! call runs under a bounded timeout.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod adapter;
pub mod booking;
pub mod config;
pub mod error;
pub mod processor;
pub mod webhook;

pub use adapter::{GatewayAdapter, WebhookOutcome};
pub use booking::{BookingDirectory, BookingSnapshot, BookingStatus};
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use processor::{
    ChargeRequest, ChargeSession, PaymentMethod, PaymentProcessor, ProcessorChargeStatus,
    RefundReceipt,
};
pub use webhook::WebhookVerifier;

/// Currency codes shared with the ledger
pub type Currency = ledger_core::Currency;
