//! Gateway orchestration
//!
//! Drives the payment lifecycle against the external processor and applies
//! confirmed outcomes to the ledger. Processor calls happen before any state
//! is persisted and never while a lock is held; a charge left dangling by a
//! timeout stays `Pending` until a webhook or a verified poll resolves it.

use crate::{
    booking::BookingDirectory,
    config::GatewayConfig,
    processor::{ChargeRequest, ChargeSession, PaymentMethod, PaymentProcessor, ProcessorChargeStatus},
    webhook::{self, ProcessorEventKind, WebhookVerifier},
    Error, Result,
};
use chrono::Utc;
use ledger_core::{locks::LockTable, Ledger, Payment, PaymentStatus};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Result of applying one webhook delivery
///
/// The HTTP surface acknowledges receipt for both variants; `Ignored` covers
/// replays, unknown references, and already-terminal payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event advanced a payment
    Applied(Uuid),
    /// The event matched nothing or had already been handled
    Ignored,
}

/// Payment gateway adapter
pub struct GatewayAdapter {
    /// Ledger core
    ledger: Arc<Ledger>,

    /// External processor
    processor: Arc<dyn PaymentProcessor>,

    /// Booking collaborator
    bookings: Arc<dyn BookingDirectory>,

    /// Webhook signature scheme
    verifier: WebhookVerifier,

    /// Per-payment serialization for status transitions
    payment_locks: LockTable<Uuid>,

    /// Configuration
    config: GatewayConfig,
}

impl GatewayAdapter {
    /// Create new adapter
    pub fn new(
        ledger: Arc<Ledger>,
        processor: Arc<dyn PaymentProcessor>,
        bookings: Arc<dyn BookingDirectory>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            ledger,
            processor,
            bookings,
            verifier: WebhookVerifier::new(config.webhook_secret.clone()),
            payment_locks: LockTable::new(),
            config,
        }
    }

    /// Webhook signature scheme (exposed so the HTTP surface can reuse it)
    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Create a charge for a payable booking
    ///
    /// Fails with [`Error::AlreadyPaid`] if the booking's payment already
    /// completed, or [`Error::BookingNotPayable`] otherwise when the booking
    /// does not accept payment. The processor is called first and the
    /// `Pending` payment mirror persisted after, so a processor timeout
    /// leaves no state behind.
    pub async fn create_charge(
        &self,
        booking_id: Uuid,
        method: PaymentMethod,
    ) -> Result<ChargeSession> {
        let booking = self.bookings.booking(booking_id).await?;

        let existing = self.ledger.payment_by_booking(booking_id)?;
        if let Some(payment) = &existing {
            if payment.status == PaymentStatus::Completed {
                return Err(Error::AlreadyPaid(booking_id));
            }
        }
        if !booking.status.is_payable() {
            return Err(Error::BookingNotPayable(booking_id));
        }

        // Reuse the merchant reference of an unfinished attempt so late
        // webhooks for either attempt land on the same payment
        let mut payment = existing.unwrap_or_else(|| {
            Payment::new(
                booking_id,
                booking.total_price,
                booking.currency,
                booking.earner.clone(),
            )
        });

        let request = ChargeRequest {
            reference: payment.payment_id,
            booking_id,
            amount: booking.total_price,
            currency: booking.currency,
            method,
        };
        let session = self
            .with_timeout(self.processor.create_charge(&request))
            .await?;

        let _guard = self.payment_locks.acquire(payment.payment_id).await;
        payment.amount = booking.total_price;
        payment.currency = booking.currency;
        payment.status = PaymentStatus::Pending;
        payment.processor_ref = Some(session.processor_ref.clone());
        payment.updated_at = Utc::now();
        self.ledger.store_payment(&payment)?;

        tracing::info!(
            payment_id = %payment.payment_id,
            %booking_id,
            amount = %payment.amount,
            processor_ref = %session.processor_ref,
            "Charge created"
        );

        Ok(session)
    }

    /// Apply one webhook delivery
    ///
    /// Rejects unverifiable deliveries without touching any state. Verified
    /// events are applied at most once: replays and races on the same
    /// payment collapse to [`WebhookOutcome::Ignored`].
    pub async fn apply_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookOutcome> {
        if !self.verifier.verify(body, signature) {
            tracing::warn!("Webhook rejected: bad signature");
            return Err(Error::InvalidSignature);
        }

        let event = webhook::parse_event(body)?;
        let Some(payment_id) = event.reference else {
            tracing::warn!("Webhook reference matches no payment, ignoring");
            return Ok(WebhookOutcome::Ignored);
        };

        self.apply_outcome(payment_id, event.kind).await
    }

    /// Resolve a payment stuck in `Pending` by polling the processor
    ///
    /// The poll is authoritative in the same way a webhook is; a charge the
    /// processor still reports as pending stays untouched.
    pub async fn resolve_pending(&self, payment_id: Uuid) -> Result<WebhookOutcome> {
        let payment = self.ledger.payment(payment_id)?;
        let Some(processor_ref) = payment.processor_ref.clone() else {
            return Err(Error::Processor(format!(
                "Payment {} has no processor reference",
                payment_id
            )));
        };

        let status = self
            .with_timeout(self.processor.charge_status(&processor_ref))
            .await?;

        match status {
            ProcessorChargeStatus::Pending => Ok(WebhookOutcome::Ignored),
            ProcessorChargeStatus::Paid => {
                self.apply_outcome(payment_id, ProcessorEventKind::Paid).await
            }
            ProcessorChargeStatus::Failed => {
                self.apply_outcome(payment_id, ProcessorEventKind::Failed).await
            }
        }
    }

    /// Refund a completed payment
    ///
    /// Refunds the full amount unless a partial amount is given. The earner's
    /// wallet credit is left in place: clawing back already-credited earnings
    /// is a manual operations decision, not an automatic consequence of a
    /// refund.
    pub async fn refund(&self, booking_id: Uuid, amount: Option<Decimal>) -> Result<Payment> {
        let payment = self
            .ledger
            .payment_by_booking(booking_id)?
            .ok_or_else(|| ledger_core::Error::PaymentNotFound(booking_id.to_string()))?;

        if payment.status != PaymentStatus::Completed {
            return Err(Error::NotRefundable {
                payment_id: payment.payment_id,
                status: payment.status,
            });
        }

        let refund_amount = amount.unwrap_or(payment.amount);
        if refund_amount <= Decimal::ZERO || refund_amount > payment.amount {
            return Err(Error::InvalidRefund(format!(
                "Refund of {} out of range for payment of {}",
                refund_amount, payment.amount
            )));
        }

        let Some(processor_ref) = payment.processor_ref.clone() else {
            return Err(Error::Processor(format!(
                "Payment {} has no processor reference",
                payment.payment_id
            )));
        };

        let receipt = self
            .with_timeout(self.processor.refund(&processor_ref, refund_amount))
            .await?;

        let _guard = self.payment_locks.acquire(payment.payment_id).await;
        let mut payment = self.ledger.payment(payment.payment_id)?;
        if payment.status != PaymentStatus::Completed {
            return Err(Error::NotRefundable {
                payment_id: payment.payment_id,
                status: payment.status,
            });
        }

        payment.status = PaymentStatus::Refunded;
        payment.refunded_amount = Some(receipt.amount);
        payment.refunded_at = Some(Utc::now());
        payment.updated_at = Utc::now();
        self.ledger.store_payment(&payment)?;

        tracing::info!(
            payment_id = %payment.payment_id,
            %booking_id,
            amount = %receipt.amount,
            "Payment refunded"
        );

        Ok(payment)
    }

    /// Apply a confirmed outcome to a payment, at most once
    async fn apply_outcome(
        &self,
        payment_id: Uuid,
        kind: ProcessorEventKind,
    ) -> Result<WebhookOutcome> {
        let _guard = self.payment_locks.acquire(payment_id).await;

        let mut payment = match self.ledger.payment(payment_id) {
            Ok(payment) => payment,
            Err(ledger_core::Error::PaymentNotFound(_)) => {
                tracing::warn!(%payment_id, "Webhook for unknown payment, ignoring");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e.into()),
        };

        // Only the Pending -> terminal edge is ours to take; everything else
        // has already been handled
        if payment.status != PaymentStatus::Pending {
            tracing::debug!(
                %payment_id,
                status = ?payment.status,
                "Payment already resolved, ignoring"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        match kind {
            ProcessorEventKind::Paid => {
                payment.status = PaymentStatus::Completed;
                payment.updated_at = Utc::now();
                self.ledger.store_payment(&payment)?;

                // Idempotent per payment: a crash between the status write
                // and this credit is repaired by the reconciliation sync
                self.ledger
                    .credit_earner_wallet(
                        &payment.earner,
                        payment.amount,
                        payment.booking_id,
                        payment.payment_id,
                    )
                    .await?;

                tracing::info!(%payment_id, amount = %payment.amount, "Payment completed");
            }
            ProcessorEventKind::Failed => {
                payment.status = PaymentStatus::Failed;
                payment.updated_at = Utc::now();
                self.ledger.store_payment(&payment)?;

                tracing::info!(%payment_id, "Payment failed");
            }
        }

        Ok(WebhookOutcome::Applied(payment_id))
    }

    async fn with_timeout<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.processor_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(Error::ProcessorUnavailable(
                "Processor call timed out".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for GatewayAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayAdapter").finish_non_exhaustive()
    }
}
