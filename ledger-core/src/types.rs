//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Recomputability (balances derive from transaction history)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque party identifier owned by the platform's user service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(String);

impl PartyId {
    /// Create new party ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Parse from string
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Which side of the marketplace a wallet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletKind {
    /// Instructor wallet: accumulates earnings, withdrawable via payout
    Earner,
    /// Learner wallet: holds deposited funds spent on bookings
    Spender,
}

/// Persisted balance record for one party
///
/// Every monetary field is denormalized from the wallet's transaction
/// history; the reconciler can rebuild all of them from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet ID
    pub wallet_id: Uuid,

    /// Owning party
    pub party: PartyId,

    /// Earner or spender side
    pub kind: WalletKind,

    /// Spendable / withdrawable now
    pub balance: Decimal,

    /// Held during payout approval (earner wallets only)
    pub pending_balance: Decimal,

    /// Lifetime credits: earnings for earner wallets, deposits for spender
    /// wallets
    pub total_earned: Decimal,

    /// Lifetime debits
    pub total_spent: Decimal,

    /// Wallets are never deleted, only deactivated
    pub is_active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a fresh zero-balance wallet
    pub fn new(party: PartyId, kind: WalletKind) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: Uuid::now_v7(),
            party,
            kind,
            balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a credit: raises `balance` and the lifetime inflow counter
    pub fn apply_credit(&mut self, amount: Decimal) {
        self.balance += amount;
        self.total_earned += amount;
        self.updated_at = Utc::now();
    }

    /// Apply a debit
    ///
    /// `Hold` moves the amount into `pending_balance`; `External` removes it
    /// from the wallet entirely. Either way the debit counts toward the
    /// lifetime outflow counter. The caller is responsible for having checked
    /// the balance first.
    pub fn apply_debit(&mut self, amount: Decimal, destination: DebitDestination) {
        self.balance -= amount;
        self.total_spent += amount;
        if destination == DebitDestination::Hold {
            self.pending_balance += amount;
        }
        self.updated_at = Utc::now();
    }

    /// Release a payout hold back into the spendable balance
    ///
    /// The matching corrective credit transaction is recorded by the caller.
    pub fn release_hold(&mut self, amount: Decimal) {
        self.pending_balance -= amount;
        self.balance += amount;
        self.total_earned += amount;
        self.updated_at = Utc::now();
    }

    /// Settle a payout hold: the money has left the platform
    pub fn settle_hold(&mut self, amount: Decimal) {
        self.pending_balance -= amount;
        self.updated_at = Utc::now();
    }
}

/// Where a debit sends the money
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitDestination {
    /// Out of the wallet entirely (spend, completed withdrawal)
    External,
    /// Into `pending_balance` while a payout awaits review
    Hold,
}

/// Transaction kind
///
/// Earner wallets use `Credit`/`Debit`; spender wallets use
/// `Deposit`/`Withdrawal`/`Payment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxnKind {
    /// Earnings credited to an earner wallet
    Credit = 1,
    /// Funds debited from an earner wallet
    Debit = 2,
    /// Funds deposited into a spender wallet
    Deposit = 3,
    /// Funds withdrawn from a spender wallet
    Withdrawal = 4,
    /// Spender wallet charged for a booking
    Payment = 5,
}

impl TxnKind {
    /// Does this kind raise the wallet balance?
    pub fn is_inflow(&self) -> bool {
        matches!(self, TxnKind::Credit | TxnKind::Deposit)
    }

    /// Is this kind valid for the given wallet side?
    pub fn matches_wallet(&self, kind: WalletKind) -> bool {
        match kind {
            WalletKind::Earner => matches!(self, TxnKind::Credit | TxnKind::Debit),
            WalletKind::Spender => {
                matches!(self, TxnKind::Deposit | TxnKind::Withdrawal | TxnKind::Payment)
            }
        }
    }
}

/// Correlation references attaching a transaction to the event that caused it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnRefs {
    /// Source booking, if any
    pub booking_id: Option<Uuid>,

    /// Source external payment; doubles as the idempotency key for credits
    pub payment_id: Option<Uuid>,

    /// Source payout request, if any
    pub payout_id: Option<Uuid>,

    /// Operator who triggered the movement, if any
    pub processed_by: Option<PartyId>,
}

impl TxnRefs {
    /// No correlation
    pub fn none() -> Self {
        Self::default()
    }

    /// Reference an external payment and its booking
    pub fn for_payment(booking_id: Uuid, payment_id: Uuid) -> Self {
        Self {
            booking_id: Some(booking_id),
            payment_id: Some(payment_id),
            ..Self::default()
        }
    }

    /// Reference a payout request
    pub fn for_payout(payout_id: Uuid) -> Self {
        Self {
            payout_id: Some(payout_id),
            ..Self::default()
        }
    }
}

/// Immutable ledger entry
///
/// Never mutated or deleted after creation. Corrections are made by
/// appending offsetting entries, not by editing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID (UUIDv7 for time-ordering)
    pub txn_id: Uuid,

    /// Owning wallet
    pub wallet_id: Uuid,

    /// Kind
    pub kind: TxnKind,

    /// Amount (always strictly positive)
    pub amount: Decimal,

    /// Human-readable description
    pub description: String,

    /// Correlation references
    #[serde(default)]
    pub refs: TxnRefs,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new entry against a wallet
    pub fn new(
        wallet_id: Uuid,
        kind: TxnKind,
        amount: Decimal,
        description: impl Into<String>,
        refs: TxnRefs,
    ) -> Self {
        Self {
            txn_id: Uuid::now_v7(),
            wallet_id,
            kind,
            amount,
            description: description.into(),
            refs,
            created_at: Utc::now(),
        }
    }
}

/// Payout request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PayoutStatus {
    /// Awaiting review; funds held in `pending_balance`
    Pending = 1,
    /// Approved; funds still held until completion
    Approved = 2,
    /// Rejected (terminal); hold returned to the balance
    Rejected = 3,
    /// Completed (terminal); funds left the platform
    Completed = 4,
}

impl PayoutStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Rejected | PayoutStatus::Completed)
    }

    /// Does a payout in this status hold funds in `pending_balance`?
    pub fn holds_funds(&self) -> bool {
        matches!(self, PayoutStatus::Pending | PayoutStatus::Approved)
    }
}

/// A withdrawal workflow instance moving held funds out of the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Payout ID
    pub payout_id: Uuid,

    /// Earner wallet the funds come from
    pub wallet_id: Uuid,

    /// Amount requested
    pub amount: Decimal,

    /// Current status
    pub status: PayoutStatus,

    /// Requested timestamp
    pub requested_at: DateTime<Utc>,

    /// Approval timestamp
    pub approved_at: Option<DateTime<Utc>>,

    /// Approving operator
    pub approved_by: Option<PartyId>,

    /// Terminal-transition timestamp (rejection or completion)
    pub processed_at: Option<DateTime<Utc>>,

    /// Operator who rejected or completed the request
    pub processed_by: Option<PartyId>,

    /// Reason given on rejection
    pub rejection_reason: Option<String>,
}

impl PayoutRequest {
    /// Create a fresh pending request
    pub fn new(wallet_id: Uuid, amount: Decimal) -> Self {
        Self {
            payout_id: Uuid::now_v7(),
            wallet_id,
            amount,
            status: PayoutStatus::Pending,
            requested_at: Utc::now(),
            approved_at: None,
            approved_by: None,
            processed_at: None,
            processed_by: None,
            rejection_reason: None,
        }
    }
}

/// The platform's retained fee share of one completed payment
///
/// One row per completed payment; never mutated. Used for financial
/// reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRevenue {
    /// Revenue row ID
    pub revenue_id: Uuid,

    /// Source booking
    pub booking_id: Uuid,

    /// Source payment
    pub payment_id: Uuid,

    /// Platform's fee share
    pub amount: Decimal,

    /// Complementary share credited to the earner
    pub payee_earning: Decimal,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// External payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PaymentStatus {
    /// Charge created; outcome not yet confirmed by the processor
    Pending = 1,
    /// Processor confirmed the charge as paid
    Completed = 2,
    /// Processor reported failure, expiry, or cancellation (terminal)
    Failed = 3,
    /// Refunded after completion (terminal)
    Refunded = 4,
}

impl PaymentStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

/// Mirror of a charge at the external payment processor
///
/// Status moves out of `Pending` only on processor confirmation (webhook or
/// verified poll), never on a direct client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID; used as the merchant reference at the processor
    pub payment_id: Uuid,

    /// Source booking (at most one payment per booking)
    pub booking_id: Uuid,

    /// Charge amount
    pub amount: Decimal,

    /// Currency
    pub currency: Currency,

    /// Current status
    pub status: PaymentStatus,

    /// Earner party to credit once the charge completes
    pub earner: PartyId,

    /// Charge/session reference at the processor
    pub processor_ref: Option<String>,

    /// Amount refunded, if any
    pub refunded_amount: Option<Decimal>,

    /// Refund timestamp
    pub refunded_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a pending payment for a booking
    pub fn new(booking_id: Uuid, amount: Decimal, currency: Currency, earner: PartyId) -> Self {
        let now = Utc::now();
        Self {
            payment_id: Uuid::now_v7(),
            booking_id,
            amount,
            currency,
            status: PaymentStatus::Pending,
            earner,
            processor_ref: None,
            refunded_amount: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("USD"), Some(Currency::USD));
        assert_eq!(Currency::from_code("GBP"), Some(Currency::GBP));
        assert_eq!(Currency::from_code("INVALID"), None);
    }

    #[test]
    fn test_wallet_credit_debit() {
        let mut wallet = Wallet::new(PartyId::new("instructor-1"), WalletKind::Earner);
        wallet.apply_credit(Decimal::new(8000, 2)); // 80.00

        assert_eq!(wallet.balance, Decimal::new(8000, 2));
        assert_eq!(wallet.total_earned, Decimal::new(8000, 2));

        wallet.apply_debit(Decimal::new(3000, 2), DebitDestination::External);
        assert_eq!(wallet.balance, Decimal::new(5000, 2));
        assert_eq!(wallet.total_spent, Decimal::new(3000, 2));
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
    }

    #[test]
    fn test_wallet_hold_release() {
        let mut wallet = Wallet::new(PartyId::new("instructor-1"), WalletKind::Earner);
        wallet.apply_credit(Decimal::from(80));

        wallet.apply_debit(Decimal::from(80), DebitDestination::Hold);
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.pending_balance, Decimal::from(80));

        wallet.release_hold(Decimal::from(80));
        assert_eq!(wallet.balance, Decimal::from(80));
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
    }

    #[test]
    fn test_txn_kind_wallet_match() {
        assert!(TxnKind::Credit.matches_wallet(WalletKind::Earner));
        assert!(!TxnKind::Credit.matches_wallet(WalletKind::Spender));
        assert!(TxnKind::Payment.matches_wallet(WalletKind::Spender));
        assert!(!TxnKind::Withdrawal.matches_wallet(WalletKind::Earner));
    }

    #[test]
    fn test_payout_status_terminal() {
        assert!(!PayoutStatus::Pending.is_terminal());
        assert!(!PayoutStatus::Approved.is_terminal());
        assert!(PayoutStatus::Rejected.is_terminal());
        assert!(PayoutStatus::Completed.is_terminal());

        assert!(PayoutStatus::Pending.holds_funds());
        assert!(PayoutStatus::Approved.holds_funds());
        assert!(!PayoutStatus::Completed.holds_funds());
    }
}
