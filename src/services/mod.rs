//! Services layer
//!
//! Business rules sit here, between the HTTP handlers and the repositories:
//! accounts and sessions, notifications, payout details, the quality check
//! and the simulated image review pipeline.

pub mod bank_details;
pub mod earnings;
pub mod email;
pub mod image_store;
pub mod lifecycle;
pub mod metadata;
pub mod notification;
pub mod password;
pub mod quality_check;
pub mod rate_limiter;
pub mod user;

pub use bank_details::{BankDetailsError, BankDetailsService};
pub use earnings::ActivityTick;
pub use email::EmailService;
pub use image_store::{ImageEvent, ImageStore, ImageStoreError};
pub use lifecycle::{LifecycleError, LifecycleService, UploadOutcome};
pub use metadata::suggest_metadata;
pub use notification::{NotificationError, NotificationService};
pub use password::{hash_password, verify_password};
pub use quality_check::{QualityCheckError, QualityCheckService, QualityReport, UploadedImage};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, RegisterInput, SetupProfileInput, UserService, UserServiceError};
