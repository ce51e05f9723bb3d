//! Booking collaborator contract
//!
//! The ledger never reaches into booking internals; this narrow snapshot is
//! everything it consumes.

use crate::Result;
use async_trait::async_trait;
use ledger_core::{Currency, PartyId};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Booking payment status as exposed by the booking service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    /// Confirmed and awaiting payment
    AwaitingPayment,
    /// Payment completed
    Paid,
    /// Cancelled before payment
    Cancelled,
}

impl BookingStatus {
    /// Can a charge be created for a booking in this status?
    pub fn is_payable(&self) -> bool {
        matches!(self, BookingStatus::AwaitingPayment)
    }
}

/// Read-only view of one booking
#[derive(Debug, Clone)]
pub struct BookingSnapshot {
    /// Booking ID
    pub booking_id: Uuid,

    /// Current status
    pub status: BookingStatus,

    /// Total price to charge
    pub total_price: Decimal,

    /// Currency
    pub currency: Currency,

    /// Instructor to credit once the payment completes
    pub earner: PartyId,

    /// Learner being charged
    pub spender: PartyId,
}

/// Booking service seam
#[async_trait]
pub trait BookingDirectory: Send + Sync {
    /// Look up one booking
    async fn booking(&self, booking_id: Uuid) -> Result<BookingSnapshot>;
}

/// Fixed in-memory directory for tests and demos
#[derive(Debug, Default)]
pub struct StubDirectory {
    bookings: parking_lot::RwLock<std::collections::HashMap<Uuid, BookingSnapshot>>,
}

impl StubDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a booking
    pub fn insert(&self, booking: BookingSnapshot) {
        self.bookings.write().insert(booking.booking_id, booking);
    }
}

#[async_trait]
impl BookingDirectory for StubDirectory {
    async fn booking(&self, booking_id: Uuid) -> Result<BookingSnapshot> {
        self.bookings
            .read()
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| crate::Error::Booking(format!("Unknown booking: {}", booking_id)))
    }
}
