//! Error types for the ledger

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Wallet not found
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Payout request not found
    #[error("Payout request not found: {0}")]
    PayoutNotFound(String),

    /// Payment not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Invalid transaction (non-positive amount, kind mismatch, etc.)
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Wallet has been deactivated
    #[error("Wallet is inactive: {0}")]
    InactiveWallet(Uuid),

    /// Debit exceeds the wallet's spendable balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Spendable balance at the time of the attempt
        available: Decimal,
        /// Amount the caller tried to move
        requested: Decimal,
    },

    /// Wallet already has a payout request awaiting review
    #[error("Payout already pending for wallet {0}")]
    DuplicatePendingPayout(Uuid),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
