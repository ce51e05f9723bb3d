//! Error types for the payout workflow

use ledger_core::PayoutStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for payout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Payout workflow errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transition attempted from a state that does not allow it
    #[error("Invalid payout state: {payout_id} is {status:?}")]
    InvalidState {
        /// Payout the transition targeted
        payout_id: Uuid,
        /// Its actual status at the time
        status: PayoutStatus,
    },

    /// Ledger error (storage, balance validation, duplicate pending payout)
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),
}
