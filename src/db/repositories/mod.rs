//! Database repositories
//!
//! Each repository owns the SQL for one table and ships a SQLite and a MySQL
//! implementation behind a trait.

pub mod bank_details;
pub mod notification;
pub mod session;
pub mod user;

pub use bank_details::{BankDetailsRepository, SqlxBankDetailsRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// True when `err` was caused by a UNIQUE constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}
