//! External payment processor seam
//!
//! The real processor lives behind [`PaymentProcessor`]; the adapter only
//! ever talks to the trait. [`MockProcessor`] stands in for it in tests.

use crate::{Error, Result};
use async_trait::async_trait;
use ledger_core::Currency;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Payment method selected by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Card payment
    Card,
    /// Bank transfer
    BankTransfer,
    /// E-wallet
    EWallet,
}

/// Charge creation request sent to the processor
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Merchant reference echoed back in webhooks (our payment ID)
    pub reference: Uuid,

    /// Booking being paid for
    pub booking_id: Uuid,

    /// Amount to charge
    pub amount: Decimal,

    /// Currency
    pub currency: Currency,

    /// Payment method
    pub method: PaymentMethod,
}

/// Processor-side charge session returned to the client
#[derive(Debug, Clone)]
pub struct ChargeSession {
    /// Charge/session ID at the processor
    pub processor_ref: String,

    /// Redirect URL for hosted checkout, if the method uses one
    pub redirect_url: Option<String>,

    /// Client secret for embedded checkout, if the method uses one
    pub client_secret: Option<String>,
}

/// Refund confirmation from the processor
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    /// Refund ID at the processor
    pub processor_ref: String,

    /// Amount refunded
    pub amount: Decimal,
}

/// Charge outcome reported by a verified status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorChargeStatus {
    /// Still awaiting the payer
    Pending,
    /// Paid
    Paid,
    /// Failed, expired, or cancelled
    Failed,
}

/// Payment processor seam
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a charge/session for the payer to complete
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeSession>;

    /// Refund (part of) a completed charge
    async fn refund(&self, processor_ref: &str, amount: Decimal) -> Result<RefundReceipt>;

    /// Authoritative status of a charge (verified poll)
    async fn charge_status(&self, processor_ref: &str) -> Result<ProcessorChargeStatus>;
}

/// In-memory processor double for tests
///
/// Records every call; can be told to fail or hang to exercise the
/// adapter's error and timeout paths.
#[derive(Debug, Default)]
pub struct MockProcessor {
    charges: parking_lot::Mutex<Vec<ChargeRequest>>,
    refunds: parking_lot::Mutex<Vec<(String, Decimal)>>,
    statuses: parking_lot::Mutex<std::collections::HashMap<String, ProcessorChargeStatus>>,
    fail_next: std::sync::atomic::AtomicBool,
    hang: std::sync::atomic::AtomicBool,
}

impl MockProcessor {
    /// Well-behaved processor
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next call
    pub fn fail_next(&self) {
        self.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make the next call hang until the caller's timeout fires
    pub fn hang_next(&self) {
        self.hang.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Set the status a poll will report for a charge
    pub fn set_status(&self, processor_ref: &str, status: ProcessorChargeStatus) {
        self.statuses.lock().insert(processor_ref.to_string(), status);
    }

    /// Charges created so far
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().clone()
    }

    /// Refunds issued so far
    pub fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds.lock().clone()
    }

    async fn gate(&self) -> Result<()> {
        if self.hang.swap(false, std::sync::atomic::Ordering::SeqCst) {
            // Outlive any sane test timeout
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::Processor("Simulated processor failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeSession> {
        self.gate().await?;
        self.charges.lock().push(request.clone());
        Ok(ChargeSession {
            processor_ref: format!("ch_{}", request.reference.simple()),
            redirect_url: Some(format!("https://processor.test/pay/{}", request.reference)),
            client_secret: None,
        })
    }

    async fn refund(&self, processor_ref: &str, amount: Decimal) -> Result<RefundReceipt> {
        self.gate().await?;
        self.refunds.lock().push((processor_ref.to_string(), amount));
        Ok(RefundReceipt {
            processor_ref: format!("re_{}", processor_ref),
            amount,
        })
    }

    async fn charge_status(&self, processor_ref: &str) -> Result<ProcessorChargeStatus> {
        self.gate().await?;
        Ok(self
            .statuses
            .lock()
            .get(processor_ref)
            .copied()
            .unwrap_or(ProcessorChargeStatus::Pending))
    }
}
