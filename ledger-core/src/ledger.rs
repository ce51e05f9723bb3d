//! Main ledger orchestration layer
//!
//! This module ties together storage, locking, and metrics into a high-level
//! API for wallet and transaction processing.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, PartyId, WalletKind};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let wallet = ledger
//!         .get_or_create_wallet(&PartyId::new("instructor-7"), WalletKind::Earner)
//!         .await?;
//!     println!("balance: {}", wallet.balance);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    locks::LockTable,
    metrics::Metrics,
    storage::{Storage, StorageStats},
    types::{
        DebitDestination, PartyId, Payment, PayoutRequest, PayoutStatus, PlatformRevenue,
        Transaction, TxnKind, TxnRefs, Wallet, WalletKind,
    },
    Config, Error, Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Main ledger interface
///
/// All balance-mutating methods serialize per wallet: the wallet's lock is
/// held across the read-validate-write sequence, and the write itself is a
/// single storage batch.
pub struct Ledger {
    /// Persistent store
    storage: Arc<Storage>,

    /// Per-wallet serialization
    wallet_locks: LockTable<Uuid>,

    /// Serializes lazy wallet creation per party
    party_locks: LockTable<PartyId>,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            storage,
            wallet_locks: LockTable::new(),
            party_locks: LockTable::new(),
            metrics,
            config,
        })
    }

    /// Direct storage access (reads, reconciliation)
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Acquire the wallet's serialization lock
    pub(crate) async fn lock_wallet(&self, wallet_id: Uuid) -> tokio::sync::OwnedMutexGuard<()> {
        self.wallet_locks.acquire(wallet_id).await
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // Wallet lifecycle

    /// Get the party's wallet, creating it lazily on first touch
    pub async fn get_or_create_wallet(
        &self,
        party: &PartyId,
        kind: WalletKind,
    ) -> Result<Wallet> {
        if let Some(wallet) = self.storage.wallet_by_party(party)? {
            return Ok(wallet);
        }

        let _guard = self.party_locks.acquire(party.clone()).await;

        // Re-check under the lock; another task may have won the race
        if let Some(wallet) = self.storage.wallet_by_party(party)? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(party.clone(), kind);
        self.storage.put_wallet(&wallet)?;

        tracing::info!(
            wallet_id = %wallet.wallet_id,
            party = %party,
            kind = ?kind,
            "Wallet created"
        );

        Ok(wallet)
    }

    /// Deactivate a wallet
    ///
    /// Wallets are never deleted; a deactivated wallet rejects further
    /// transactions but keeps its full history.
    pub async fn deactivate_wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        let _guard = self.wallet_locks.acquire(wallet_id).await;

        let mut wallet = self.storage.get_wallet(wallet_id)?;
        wallet.is_active = false;
        wallet.updated_at = Utc::now();
        self.storage.put_wallet(&wallet)?;

        tracing::info!(wallet_id = %wallet_id, "Wallet deactivated");
        Ok(wallet)
    }

    // Transaction recording

    /// Append a transaction and update the wallet's totals atomically
    ///
    /// The caller selects the kind; it must match the wallet's side of the
    /// marketplace. Outflow kinds are bounded by the spendable balance.
    pub async fn record_transaction(
        &self,
        wallet_id: Uuid,
        kind: TxnKind,
        amount: Decimal,
        description: impl Into<String>,
        refs: TxnRefs,
    ) -> Result<Transaction> {
        validate_amount(amount)?;

        let _guard = self.wallet_locks.acquire(wallet_id).await;
        let mut wallet = self.checked_wallet(wallet_id)?;

        if !kind.matches_wallet(wallet.kind) {
            return Err(Error::InvalidTransaction(format!(
                "{:?} transaction not valid for {:?} wallet",
                kind, wallet.kind
            )));
        }

        if kind.is_inflow() {
            wallet.apply_credit(amount);
        } else {
            ensure_balance(&wallet, amount)?;
            wallet.apply_debit(amount, DebitDestination::External);
        }

        let txn = Transaction::new(wallet_id, kind, amount, description, refs);
        let started = std::time::Instant::now();
        self.storage.apply_transaction(&txn, &wallet)?;
        self.metrics.append_duration.observe(started.elapsed().as_secs_f64());
        self.metrics.transactions_total.inc();

        Ok(txn)
    }

    /// Credit an earner for a completed external payment, splitting off the
    /// platform fee
    ///
    /// Computes `platform_fee = gross × fee% / 100` (rounded to cents) and
    /// credits the complement to the earner's wallet, recording a
    /// [`PlatformRevenue`] row in the same batch.
    ///
    /// Idempotent per `payment_id`: if a transaction already references the
    /// payment, returns `Ok(None)` and writes nothing. This is what makes
    /// webhook retries and reconciliation re-runs safe.
    pub async fn credit_earner_wallet(
        &self,
        party: &PartyId,
        gross: Decimal,
        booking_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Transaction>> {
        validate_amount(gross)?;

        let wallet_id = self
            .get_or_create_wallet(party, WalletKind::Earner)
            .await?
            .wallet_id;

        let _guard = self.wallet_locks.acquire(wallet_id).await;

        if self.storage.txn_for_payment(payment_id)?.is_some() {
            tracing::debug!(%payment_id, "Payment already credited, skipping");
            return Ok(None);
        }

        let fee = (gross * self.config.fees.platform_percent / Decimal::ONE_HUNDRED).round_dp(2);
        let earner_share = gross - fee;
        if earner_share <= Decimal::ZERO {
            return Err(Error::InvalidTransaction(format!(
                "Fee split leaves no earner share for gross {}",
                gross
            )));
        }

        let mut wallet = self.checked_wallet(wallet_id)?;
        wallet.apply_credit(earner_share);

        let txn = Transaction::new(
            wallet_id,
            TxnKind::Credit,
            earner_share,
            "Lesson payment received",
            TxnRefs::for_payment(booking_id, payment_id),
        );
        let revenue = PlatformRevenue {
            revenue_id: Uuid::now_v7(),
            booking_id,
            payment_id,
            amount: fee,
            payee_earning: earner_share,
            created_at: Utc::now(),
        };

        let started = std::time::Instant::now();
        self.storage.apply_credit_with_revenue(&txn, &wallet, &revenue)?;
        self.metrics.append_duration.observe(started.elapsed().as_secs_f64());
        self.metrics.transactions_total.inc();

        tracing::info!(
            wallet_id = %wallet_id,
            %payment_id,
            gross = %gross,
            fee = %fee,
            earning = %earner_share,
            "Earner credited for payment"
        );

        Ok(Some(txn))
    }

    /// Debit a wallet's spendable balance
    ///
    /// Fails with [`Error::InsufficientBalance`] if `amount` exceeds the
    /// balance. `destination` chooses between leaving the wallet entirely
    /// and being held in `pending_balance` during payout review.
    pub async fn debit_wallet(
        &self,
        wallet_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        destination: DebitDestination,
        refs: TxnRefs,
    ) -> Result<Transaction> {
        validate_amount(amount)?;

        let _guard = self.wallet_locks.acquire(wallet_id).await;
        let mut wallet = self.checked_wallet(wallet_id)?;
        ensure_balance(&wallet, amount)?;

        wallet.apply_debit(amount, destination);

        let kind = debit_kind(wallet.kind);
        let txn = Transaction::new(wallet_id, kind, amount, description, refs);
        self.storage.apply_transaction(&txn, &wallet)?;
        self.metrics.transactions_total.inc();

        Ok(txn)
    }

    // Payout hold primitives
    //
    // The payout state machine lives in the `payouts` crate; these methods
    // own the money movement and the atomic persistence each transition
    // needs.

    /// Place the hold for a freshly created payout request
    ///
    /// Validates the balance and the one-pending-request rule, then debits
    /// `balance` into `pending_balance` and persists the request, the debit
    /// transaction, and the wallet in one batch.
    pub async fn hold_for_payout(&self, payout: &PayoutRequest) -> Result<Transaction> {
        validate_amount(payout.amount)?;

        let _guard = self.wallet_locks.acquire(payout.wallet_id).await;
        let mut wallet = self.checked_wallet(payout.wallet_id)?;
        ensure_balance(&wallet, payout.amount)?;

        if let Some(open) = self.storage.pending_payout(payout.wallet_id)? {
            tracing::debug!(payout_id = %open, wallet_id = %payout.wallet_id, "Open payout blocks new request");
            return Err(Error::DuplicatePendingPayout(payout.wallet_id));
        }

        wallet.apply_debit(payout.amount, DebitDestination::Hold);
        let txn = Transaction::new(
            payout.wallet_id,
            TxnKind::Debit,
            payout.amount,
            "Payout requested, funds held",
            TxnRefs::for_payout(payout.payout_id),
        );

        self.storage
            .apply_payout(payout, None, Some(&wallet), Some(&txn))?;
        self.metrics.transactions_total.inc();
        self.metrics.payout_transitions_total.inc();

        tracing::info!(
            payout_id = %payout.payout_id,
            wallet_id = %payout.wallet_id,
            amount = %payout.amount,
            "Payout hold placed"
        );

        Ok(txn)
    }

    /// Persist a payout status change that moves no money (approval)
    pub async fn store_payout(
        &self,
        payout: &PayoutRequest,
        prev_status: PayoutStatus,
    ) -> Result<()> {
        let _guard = self.wallet_locks.acquire(payout.wallet_id).await;
        self.storage.apply_payout(payout, Some(prev_status), None, None)?;
        self.metrics.payout_transitions_total.inc();
        Ok(())
    }

    /// Return a rejected payout's hold to the spendable balance
    ///
    /// The reversal is recorded as a corrective credit transaction so the
    /// balance stays derivable from history.
    pub async fn release_payout_hold(&self, payout: &PayoutRequest) -> Result<Transaction> {
        let _guard = self.wallet_locks.acquire(payout.wallet_id).await;

        let mut wallet = self.storage.get_wallet(payout.wallet_id)?;
        wallet.release_hold(payout.amount);

        let txn = Transaction::new(
            payout.wallet_id,
            TxnKind::Credit,
            payout.amount,
            "Payout rejected, hold returned",
            TxnRefs::for_payout(payout.payout_id),
        );

        self.storage
            .apply_payout(payout, Some(PayoutStatus::Pending), Some(&wallet), Some(&txn))?;
        self.metrics.transactions_total.inc();
        self.metrics.payout_transitions_total.inc();

        tracing::info!(
            payout_id = %payout.payout_id,
            wallet_id = %payout.wallet_id,
            amount = %payout.amount,
            "Payout hold released"
        );

        Ok(txn)
    }

    /// Settle a completed payout's hold: the money has left the platform
    pub async fn settle_payout_hold(&self, payout: &PayoutRequest) -> Result<()> {
        let _guard = self.wallet_locks.acquire(payout.wallet_id).await;

        let mut wallet = self.storage.get_wallet(payout.wallet_id)?;
        wallet.settle_hold(payout.amount);

        self.storage
            .apply_payout(payout, Some(PayoutStatus::Approved), Some(&wallet), None)?;
        self.metrics.payout_transitions_total.inc();

        tracing::info!(
            payout_id = %payout.payout_id,
            wallet_id = %payout.wallet_id,
            amount = %payout.amount,
            "Payout settled"
        );

        Ok(())
    }

    // Payment mirror persistence (driven by the gateway)

    /// Insert or update a payment mirror record
    pub fn store_payment(&self, payment: &Payment) -> Result<()> {
        self.storage.put_payment(payment)
    }

    /// Get payment by ID
    pub fn payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.storage.get_payment(payment_id)
    }

    /// Get payment by booking
    pub fn payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        self.storage.payment_by_booking(booking_id)
    }

    // Queries

    /// Wallet by ID
    pub fn wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        self.storage.get_wallet(wallet_id)
    }

    /// Wallet by owning party
    pub fn wallet_by_party(&self, party: &PartyId) -> Result<Option<Wallet>> {
        self.storage.wallet_by_party(party)
    }

    /// A wallet's most recent transactions, newest first
    pub fn recent_transactions(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let mut txns = self.storage.wallet_transactions(wallet_id)?;
        txns.reverse();
        txns.truncate(limit);
        Ok(txns)
    }

    /// Payout request by ID
    pub fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.storage.get_payout(payout_id)
    }

    /// Platform revenue rows
    pub fn platform_revenue(&self) -> Result<Vec<PlatformRevenue>> {
        self.storage.list_revenue()
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    // Helpers

    fn checked_wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        let wallet = self.storage.get_wallet(wallet_id)?;
        if !wallet.is_active {
            return Err(Error::InactiveWallet(wallet_id));
        }
        Ok(wallet)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("data_dir", &self.config.data_dir)
            .finish_non_exhaustive()
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidTransaction(format!(
            "Amount must be positive: {}",
            amount
        )));
    }
    Ok(())
}

fn ensure_balance(wallet: &Wallet, requested: Decimal) -> Result<()> {
    if requested > wallet.balance {
        return Err(Error::InsufficientBalance {
            available: wallet.balance,
            requested,
        });
    }
    Ok(())
}

fn debit_kind(kind: WalletKind) -> TxnKind {
    match kind {
        WalletKind::Earner => TxnKind::Debit,
        WalletKind::Spender => TxnKind::Withdrawal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Ledger::open(config).unwrap(), temp_dir)
    }

    fn party(id: &str) -> PartyId {
        PartyId::new(id)
    }

    #[tokio::test]
    async fn test_wallet_created_lazily_once() {
        let (ledger, _temp) = test_ledger();

        let first = ledger
            .get_or_create_wallet(&party("instructor-1"), WalletKind::Earner)
            .await
            .unwrap();
        let second = ledger
            .get_or_create_wallet(&party("instructor-1"), WalletKind::Earner)
            .await
            .unwrap();

        assert_eq!(first.wallet_id, second.wallet_id);
        assert_eq!(second.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_credit_splits_platform_fee() {
        let (ledger, _temp) = test_ledger();
        let booking_id = Uuid::now_v7();
        let payment_id = Uuid::now_v7();

        let txn = ledger
            .credit_earner_wallet(&party("instructor-1"), Decimal::from(100), booking_id, payment_id)
            .await
            .unwrap()
            .unwrap();

        // 20% default fee: earner gets 80
        assert_eq!(txn.amount, Decimal::from(80));

        let wallet = ledger.wallet_by_party(&party("instructor-1")).unwrap().unwrap();
        assert_eq!(wallet.balance, Decimal::from(80));
        assert_eq!(wallet.total_earned, Decimal::from(80));

        let revenue = ledger.platform_revenue().unwrap();
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].amount, Decimal::from(20));
        assert_eq!(revenue[0].payee_earning, Decimal::from(80));
        assert_eq!(revenue[0].payment_id, payment_id);
    }

    #[tokio::test]
    async fn test_credit_is_idempotent_per_payment() {
        let (ledger, _temp) = test_ledger();
        let booking_id = Uuid::now_v7();
        let payment_id = Uuid::now_v7();

        let first = ledger
            .credit_earner_wallet(&party("instructor-1"), Decimal::from(100), booking_id, payment_id)
            .await
            .unwrap();
        let second = ledger
            .credit_earner_wallet(&party("instructor-1"), Decimal::from(100), booking_id, payment_id)
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());

        let wallet = ledger.wallet_by_party(&party("instructor-1")).unwrap().unwrap();
        assert_eq!(wallet.balance, Decimal::from(80));
        assert_eq!(ledger.recent_transactions(wallet.wallet_id, 10).unwrap().len(), 1);
        assert_eq!(ledger.platform_revenue().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fee_rounds_to_cents_and_shares_sum() {
        let (ledger, _temp) = test_ledger();
        let gross = Decimal::new(3333, 2); // 33.33

        ledger
            .credit_earner_wallet(&party("instructor-1"), gross, Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap();

        let revenue = ledger.platform_revenue().unwrap();
        // 20% of 33.33 = 6.666 -> 6.67 (rounded); earner gets the complement
        assert_eq!(revenue[0].amount, Decimal::new(667, 2));
        assert_eq!(revenue[0].payee_earning, Decimal::new(2666, 2));
        assert_eq!(revenue[0].amount + revenue[0].payee_earning, gross);
    }

    #[tokio::test]
    async fn test_debit_insufficient_balance() {
        let (ledger, _temp) = test_ledger();
        let wallet = ledger
            .get_or_create_wallet(&party("instructor-1"), WalletKind::Earner)
            .await
            .unwrap();

        let result = ledger
            .debit_wallet(
                wallet.wallet_id,
                Decimal::from(10),
                "test debit",
                DebitDestination::External,
                TxnRefs::none(),
            )
            .await;

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));

        // No side effects
        let wallet = ledger.wallet(wallet.wallet_id).unwrap();
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert!(ledger.recent_transactions(wallet.wallet_id, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_transaction_rejects_bad_input() {
        let (ledger, _temp) = test_ledger();
        let wallet = ledger
            .get_or_create_wallet(&party("learner-1"), WalletKind::Spender)
            .await
            .unwrap();

        // Non-positive amount
        let result = ledger
            .record_transaction(
                wallet.wallet_id,
                TxnKind::Deposit,
                Decimal::ZERO,
                "zero",
                TxnRefs::none(),
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidTransaction(_))));

        // Earner-side kind against a spender wallet
        let result = ledger
            .record_transaction(
                wallet.wallet_id,
                TxnKind::Credit,
                Decimal::from(10),
                "wrong kind",
                TxnRefs::none(),
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidTransaction(_))));
    }

    #[tokio::test]
    async fn test_spender_deposit_and_payment() {
        let (ledger, _temp) = test_ledger();
        let wallet = ledger
            .get_or_create_wallet(&party("learner-1"), WalletKind::Spender)
            .await
            .unwrap();

        ledger
            .record_transaction(
                wallet.wallet_id,
                TxnKind::Deposit,
                Decimal::from(50),
                "Top-up",
                TxnRefs::none(),
            )
            .await
            .unwrap();
        ledger
            .record_transaction(
                wallet.wallet_id,
                TxnKind::Payment,
                Decimal::from(30),
                "Lesson booking",
                TxnRefs::none(),
            )
            .await
            .unwrap();

        let wallet = ledger.wallet(wallet.wallet_id).unwrap();
        assert_eq!(wallet.balance, Decimal::from(20));
        assert_eq!(wallet.total_earned, Decimal::from(50));
        assert_eq!(wallet.total_spent, Decimal::from(30));
    }

    #[tokio::test]
    async fn test_inactive_wallet_rejects_movement() {
        let (ledger, _temp) = test_ledger();
        let wallet = ledger
            .get_or_create_wallet(&party("instructor-1"), WalletKind::Earner)
            .await
            .unwrap();
        ledger.deactivate_wallet(wallet.wallet_id).await.unwrap();

        let result = ledger
            .record_transaction(
                wallet.wallet_id,
                TxnKind::Credit,
                Decimal::from(10),
                "late credit",
                TxnRefs::none(),
            )
            .await;
        assert!(matches!(result, Err(Error::InactiveWallet(_))));
    }

    #[tokio::test]
    async fn test_hold_rejects_second_pending_payout() {
        let (ledger, _temp) = test_ledger();
        ledger
            .credit_earner_wallet(&party("instructor-1"), Decimal::from(100), Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap();
        let wallet = ledger.wallet_by_party(&party("instructor-1")).unwrap().unwrap();

        let first = PayoutRequest::new(wallet.wallet_id, Decimal::from(30));
        ledger.hold_for_payout(&first).await.unwrap();

        let second = PayoutRequest::new(wallet.wallet_id, Decimal::from(10));
        let result = ledger.hold_for_payout(&second).await;
        assert!(matches!(result, Err(Error::DuplicatePendingPayout(_))));

        // Only the first hold took effect
        let wallet = ledger.wallet(wallet.wallet_id).unwrap();
        assert_eq!(wallet.balance, Decimal::from(50));
        assert_eq!(wallet.pending_balance, Decimal::from(30));
    }

    #[tokio::test]
    async fn test_concurrent_credits_serialize_per_wallet() {
        let (ledger, _temp) = test_ledger();
        let ledger = Arc::new(ledger);
        let wallet = ledger
            .get_or_create_wallet(&party("instructor-1"), WalletKind::Earner)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            let wallet_id = wallet.wallet_id;
            handles.push(tokio::spawn(async move {
                ledger
                    .record_transaction(
                        wallet_id,
                        TxnKind::Credit,
                        Decimal::from(10),
                        format!("credit {}", i),
                        TxnRefs::none(),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let wallet = ledger.wallet(wallet.wallet_id).unwrap();
        assert_eq!(wallet.balance, Decimal::from(80));
        assert_eq!(ledger.recent_transactions(wallet.wallet_id, 100).unwrap().len(), 8);
    }
}
