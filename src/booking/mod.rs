//! Bookings: model, status machines, and the commit orchestrator.

pub mod model;
pub mod orchestrator;

pub use model::{Booking, BookingStatus, PaymentStatus, idempotency_key, scheduled_time_for};
pub use orchestrator::{BookingOrchestrator, BookingReceipt};
