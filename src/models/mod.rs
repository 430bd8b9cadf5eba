//! Data models
//!
//! Database entities (User, Session, BankDetails, Notification), the
//! in-memory image records of the lifecycle simulator, and the input types
//! the services accept.

mod bank_details;
mod image;
mod notification;
mod session;
mod user;

pub use bank_details::{last_four, BankDetails, BankDetailsInput, NewBankDetails};
pub use image::{
    DebugImage, DebugInfo, ImageMetadata, ImageRecord, ImageStats, ImageStatus, MetadataPatch,
    PruneResult, MAX_KEYWORDS, MAX_TAGS,
};
pub use notification::{
    decode_channels, encode_channels, NewNotification, Notification, NotificationChannel,
    NotificationType,
};
pub use session::Session;
pub use user::{ContributorStatus, ExperienceLevel, ProfileInput, User};
