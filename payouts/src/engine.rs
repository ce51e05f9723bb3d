//! Payout workflow engine
//!
//! Owns the state-machine validation; `ledger-core` owns the money. Every
//! transition re-reads the request under its own lock, so concurrent admin
//! actions on one payout serialize and the loser gets a clean state error.

use crate::{Error, Result};
use chrono::Utc;
use ledger_core::{
    locks::LockTable, Ledger, PartyId, PayoutRequest, PayoutStatus, WalletKind,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Payout workflow engine
pub struct PayoutEngine {
    /// Ledger core
    ledger: Arc<Ledger>,

    /// Per-payout serialization for admin transitions
    locks: LockTable<Uuid>,
}

impl PayoutEngine {
    /// Create new engine over an open ledger
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            locks: LockTable::new(),
        }
    }

    /// Request withdrawal of held earnings
    ///
    /// Fails with `InsufficientBalance` if the amount exceeds the wallet's
    /// spendable balance, or `DuplicatePendingPayout` if an earlier request
    /// is still awaiting review. On success the amount has moved from
    /// `balance` to `pending_balance`.
    pub async fn create_request(&self, party: &PartyId, amount: Decimal) -> Result<PayoutRequest> {
        let wallet = self
            .ledger
            .get_or_create_wallet(party, WalletKind::Earner)
            .await?;

        let payout = PayoutRequest::new(wallet.wallet_id, amount);
        self.ledger.hold_for_payout(&payout).await?;

        tracing::info!(
            payout_id = %payout.payout_id,
            party = %party,
            amount = %amount,
            "Payout requested"
        );

        Ok(payout)
    }

    /// Approve a pending request
    ///
    /// Moves no money; the funds already sit in `pending_balance`.
    pub async fn approve(&self, payout_id: Uuid, approver: &PartyId) -> Result<PayoutRequest> {
        let _guard = self.locks.acquire(payout_id).await;

        let mut payout = self.expect_status(payout_id, PayoutStatus::Pending)?;
        payout.status = PayoutStatus::Approved;
        payout.approved_at = Some(Utc::now());
        payout.approved_by = Some(approver.clone());

        self.ledger.store_payout(&payout, PayoutStatus::Pending).await?;

        tracing::info!(payout_id = %payout_id, approver = %approver, "Payout approved");
        Ok(payout)
    }

    /// Reject a pending request, returning the hold to the balance
    ///
    /// The reversal is recorded as a corrective credit transaction.
    pub async fn reject(
        &self,
        payout_id: Uuid,
        approver: &PartyId,
        reason: impl Into<String>,
    ) -> Result<PayoutRequest> {
        let _guard = self.locks.acquire(payout_id).await;

        let mut payout = self.expect_status(payout_id, PayoutStatus::Pending)?;
        payout.status = PayoutStatus::Rejected;
        payout.processed_at = Some(Utc::now());
        payout.processed_by = Some(approver.clone());
        payout.rejection_reason = Some(reason.into());

        self.ledger.release_payout_hold(&payout).await?;

        tracing::info!(
            payout_id = %payout_id,
            approver = %approver,
            reason = payout.rejection_reason.as_deref().unwrap_or(""),
            "Payout rejected"
        );
        Ok(payout)
    }

    /// Complete an approved request once the money has been paid out
    ///
    /// Releases the hold without touching the spendable balance.
    pub async fn complete(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        let _guard = self.locks.acquire(payout_id).await;

        let mut payout = self.expect_status(payout_id, PayoutStatus::Approved)?;
        payout.status = PayoutStatus::Completed;
        payout.processed_at = Some(Utc::now());

        self.ledger.settle_payout_hold(&payout).await?;

        tracing::info!(payout_id = %payout_id, "Payout completed");
        Ok(payout)
    }

    /// Get one payout request
    pub fn request(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        Ok(self.ledger.payout(payout_id)?)
    }

    /// List payout requests, filtered and paginated, newest first
    pub fn list(&self, filter: &PayoutFilter, offset: usize, limit: usize) -> Result<PayoutPage> {
        let mut requests = match (&filter.party, filter.status) {
            (Some(party), _) => match self.ledger.wallet_by_party(party)? {
                Some(wallet) => self.ledger.storage().payouts_by_wallet(wallet.wallet_id)?,
                None => Vec::new(),
            },
            (None, Some(status)) => self.ledger.storage().payouts_by_status(status)?,
            (None, None) => self.ledger.storage().list_payouts()?,
        };

        if let Some(status) = filter.status {
            requests.retain(|p| p.status == status);
        }

        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        let total = requests.len();
        let items: Vec<PayoutRequest> = requests.into_iter().skip(offset).take(limit).collect();

        Ok(PayoutPage {
            items,
            total,
            offset,
            limit,
        })
    }

    /// Load the payout and require it to be in `expected` status
    fn expect_status(&self, payout_id: Uuid, expected: PayoutStatus) -> Result<PayoutRequest> {
        let payout = self.ledger.payout(payout_id)?;
        if payout.status != expected {
            return Err(Error::InvalidState {
                payout_id,
                status: payout.status,
            });
        }
        Ok(payout)
    }
}

impl std::fmt::Debug for PayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutEngine").finish_non_exhaustive()
    }
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct PayoutFilter {
    /// Restrict to one status
    pub status: Option<PayoutStatus>,

    /// Restrict to one earner
    pub party: Option<PartyId>,
}

/// One page of payout requests
#[derive(Debug, Clone)]
pub struct PayoutPage {
    /// Requests in this page, newest first
    pub items: Vec<PayoutRequest>,

    /// Total matching requests before pagination
    pub total: usize,

    /// Page offset
    pub offset: usize,

    /// Page limit
    pub limit: usize,
}
