//! Relational persistence for bookings, profiles, loyalty, referrals,
//! and notifications.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
