//! Reconciliation engine
//!
//! Recomputes every derived wallet field strictly from immutable history and
//! repairs drift. This is the system's authority for correctness: balances
//! flow from transactions, never the other way around, so reconciliation is
//! safe to run at any time. It never alters or deletes a transaction.

use crate::{types::Wallet, Ledger, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of auditing one wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAudit {
    /// Audited wallet
    pub wallet_id: Uuid,

    /// Balance as stored before the audit
    pub stored_balance: Decimal,

    /// Balance recomputed from transaction history
    pub computed_balance: Decimal,

    /// Pending balance as stored before the audit
    pub stored_pending: Decimal,

    /// Pending balance recomputed from open payout requests
    pub computed_pending: Decimal,

    /// True if any field differed beyond the drift tolerance
    pub drifted: bool,

    /// True if the stored wallet was overwritten with computed values
    pub corrected: bool,

    /// Audit timestamp
    pub audited_at: DateTime<Utc>,
}

/// Totals recomputed from a wallet's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ComputedTotals {
    balance: Decimal,
    pending: Decimal,
    earned: Decimal,
    spent: Decimal,
}

impl Ledger {
    /// Audit one wallet against its history and repair any drift
    ///
    /// Differences at or below the configured tolerance are treated as
    /// rounding noise and left alone. Anything larger is overwritten with
    /// the computed values and logged.
    pub async fn reconcile(&self, wallet_id: Uuid) -> Result<WalletAudit> {
        let _guard = self.lock_wallet(wallet_id).await;

        let mut wallet = self.storage().get_wallet(wallet_id)?;
        let computed = self.compute_totals(&wallet)?;
        let tolerance = self.config().reconcile.drift_tolerance;

        let drifted = (wallet.balance - computed.balance).abs() > tolerance
            || (wallet.pending_balance - computed.pending).abs() > tolerance
            || (wallet.total_earned - computed.earned).abs() > tolerance
            || (wallet.total_spent - computed.spent).abs() > tolerance;

        let audit = WalletAudit {
            wallet_id,
            stored_balance: wallet.balance,
            computed_balance: computed.balance,
            stored_pending: wallet.pending_balance,
            computed_pending: computed.pending,
            drifted,
            corrected: drifted,
            audited_at: Utc::now(),
        };

        if drifted {
            tracing::warn!(
                %wallet_id,
                stored_balance = %wallet.balance,
                computed_balance = %computed.balance,
                stored_pending = %wallet.pending_balance,
                computed_pending = %computed.pending,
                "Wallet drift detected, repairing from history"
            );

            wallet.balance = computed.balance;
            wallet.pending_balance = computed.pending;
            wallet.total_earned = computed.earned;
            wallet.total_spent = computed.spent;
            wallet.updated_at = Utc::now();
            self.storage().put_wallet(&wallet)?;
            self.metrics().drift_corrections_total.inc();
        }

        Ok(audit)
    }

    /// Audit every wallet (admin audit, startup)
    pub async fn reconcile_all(&self) -> Result<Vec<WalletAudit>> {
        let wallets = self.storage().list_wallets()?;
        let mut audits = Vec::with_capacity(wallets.len());

        for wallet in wallets {
            audits.push(self.reconcile(wallet.wallet_id).await?);
        }

        let corrected = audits.iter().filter(|a| a.corrected).count();
        tracing::info!(
            wallets = audits.len(),
            corrected,
            "Reconciliation sweep complete"
        );

        Ok(audits)
    }

    /// Credit earners for completed external payments the ledger missed
    ///
    /// Scans payments the processor confirmed as completed and credits every
    /// one that has no ledger transaction keyed by its payment ID. Safe to
    /// re-run arbitrarily: the payment-keyed idempotency check skips
    /// anything already credited.
    pub async fn sync_pending_external_payments(&self) -> Result<u64> {
        let mut credited = 0u64;

        for payment in self.storage().list_payments()? {
            if payment.status != crate::PaymentStatus::Completed {
                continue;
            }
            if self.storage().txn_for_payment(payment.payment_id)?.is_some() {
                continue;
            }

            tracing::warn!(
                payment_id = %payment.payment_id,
                booking_id = %payment.booking_id,
                "Completed payment missing ledger credit, repairing"
            );

            if self
                .credit_earner_wallet(
                    &payment.earner,
                    payment.amount,
                    payment.booking_id,
                    payment.payment_id,
                )
                .await?
                .is_some()
            {
                credited += 1;
                self.metrics().payments_synced_total.inc();
            }
        }

        tracing::info!(credited, "External payment sync complete");
        Ok(credited)
    }

    fn compute_totals(&self, wallet: &Wallet) -> Result<ComputedTotals> {
        let mut earned = Decimal::ZERO;
        let mut spent = Decimal::ZERO;

        for txn in self.storage().wallet_transactions(wallet.wallet_id)? {
            if txn.kind.is_inflow() {
                earned += txn.amount;
            } else {
                spent += txn.amount;
            }
        }

        let mut pending = Decimal::ZERO;
        for payout in self.storage().payouts_by_wallet(wallet.wallet_id)? {
            if payout.status.holds_funds() {
                pending += payout.amount;
            }
        }

        Ok(ComputedTotals {
            balance: earned - spent,
            pending,
            earned,
            spent,
        })
    }
}
