//! Payout workflow for the LessonPay ledger
//!
//! State machine governing withdrawal of held earnings:
//!
//! ```text
//! Pending ──> Approved ──> Completed
//!    │
//!    └──────> Rejected
//! ```
//!
//! Creating a request moves the amount from the wallet's spendable balance
//! into its pending balance; rejection returns it via a corrective credit;
//! completion releases the hold once the money has left the platform. All
//! money movement is delegated to `ledger-core`, which commits each
//! transition atomically.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod engine;
pub mod error;

pub use engine::{PayoutEngine, PayoutFilter, PayoutPage};
pub use error::{Error, Result};

// Re-export the record types callers page through
pub use ledger_core::{PayoutRequest, PayoutStatus};
