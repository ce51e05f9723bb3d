//! LessonPay Ledger Core
//!
//! Wallet and transaction store for the LessonPay marketplace.
//!
//! # Architecture
//!
//! - **Append-only history**: Transactions are immutable; corrections are
//!   offsetting entries, never edits
//! - **Derived balances**: Every wallet total is recomputable from its
//!   transaction history, and the reconciler does exactly that
//! - **Atomic commits**: A transaction insert and its wallet update land in
//!   one storage batch or not at all
//! - **Per-wallet serialization**: Concurrent operations on independent
//!   wallets proceed in parallel; operations on the same wallet queue
//!
//! # Invariants
//!
//! - `balance == Σ(credits) - Σ(debits)` over a wallet's transactions
//! - `pending_balance == Σ(amounts of payouts currently held)`
//! - Crediting a wallet for an external payment happens at most once per
//!   payment, no matter how often the confirmation is delivered

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod reconcile;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use reconcile::WalletAudit;
pub use types::{
    Currency, DebitDestination, PartyId, Payment, PaymentStatus, PayoutRequest, PayoutStatus,
    PlatformRevenue, Transaction, TxnKind, TxnRefs, Wallet, WalletKind,
};
