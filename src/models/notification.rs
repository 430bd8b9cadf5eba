//! Notification model and message templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A message addressed to one contributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub channels: Vec<NotificationChannel>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    QualityCheckPassed,
    QualityCheckFailed,
    ImageApproved,
    ImageRejected,
    SaleMade,
    PayoutProcessed,
    AccountUpdate,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::QualityCheckPassed => "QUALITY_CHECK_PASSED",
            NotificationType::QualityCheckFailed => "QUALITY_CHECK_FAILED",
            NotificationType::ImageApproved => "IMAGE_APPROVED",
            NotificationType::ImageRejected => "IMAGE_REJECTED",
            NotificationType::SaleMade => "SALE_MADE",
            NotificationType::PayoutProcessed => "PAYOUT_PROCESSED",
            NotificationType::AccountUpdate => "ACCOUNT_UPDATE",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "QUALITY_CHECK_PASSED" => Ok(NotificationType::QualityCheckPassed),
            "QUALITY_CHECK_FAILED" => Ok(NotificationType::QualityCheckFailed),
            "IMAGE_APPROVED" => Ok(NotificationType::ImageApproved),
            "IMAGE_REJECTED" => Ok(NotificationType::ImageRejected),
            "SALE_MADE" => Ok(NotificationType::SaleMade),
            "PAYOUT_PROCESSED" => Ok(NotificationType::PayoutProcessed),
            "ACCOUNT_UPDATE" => Ok(NotificationType::AccountUpdate),
            _ => Err(anyhow::anyhow!("Invalid notification type: {}", s)),
        }
    }
}

/// Delivery channel requested for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Mobile,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Email => write!(f, "email"),
            NotificationChannel::Mobile => write!(f, "mobile"),
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(NotificationChannel::Email),
            "mobile" => Ok(NotificationChannel::Mobile),
            _ => Err(anyhow::anyhow!("Invalid notification channel: {}", s)),
        }
    }
}

/// Column encoding for the channel list
pub fn encode_channels(channels: &[NotificationChannel]) -> String {
    serde_json::to_string(channels).unwrap_or_else(|_| "[\"email\"]".to_string())
}

/// Decode the channel column. Unknown or malformed values fall back to email.
pub fn decode_channels(raw: &str) -> Vec<NotificationChannel> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(values) => {
            let channels: Vec<NotificationChannel> =
                values.iter().filter_map(|v| v.parse().ok()).collect();
            if channels.is_empty() {
                vec![NotificationChannel::Email]
            } else {
                channels
            }
        }
        Err(_) => vec![NotificationChannel::Email],
    }
}

/// A notification about to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub channels: Vec<NotificationChannel>,
}

impl NewNotification {
    pub fn new(
        user_id: i64,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            channels: vec![NotificationChannel::Email],
        }
    }

    pub fn with_channels(mut self, channels: Vec<NotificationChannel>) -> Self {
        if !channels.is_empty() {
            self.channels = channels;
        }
        self
    }

    pub fn image_approved(user_id: i64, image_title: &str) -> Self {
        Self::new(
            user_id,
            NotificationType::ImageApproved,
            "Image Approved! 🎉",
            format!(
                "Your image \"{}\" has been approved and is now live on the marketplace.",
                image_title
            ),
        )
    }

    pub fn image_rejected(user_id: i64, image_title: &str, reason: Option<&str>) -> Self {
        let detail = match reason {
            Some(reason) => format!("Reason: {}", reason),
            None => "Please review our quality guidelines.".to_string(),
        };
        Self::new(
            user_id,
            NotificationType::ImageRejected,
            "Image Needs Attention",
            format!("Your image \"{}\" was rejected. {}", image_title, detail),
        )
    }

    pub fn quality_check_passed(user_id: i64) -> Self {
        Self::new(
            user_id,
            NotificationType::QualityCheckPassed,
            "Quality Check Passed!",
            "Congratulations! Your images have passed our quality check. You can now start uploading and selling your photos.",
        )
        .with_channels(vec![NotificationChannel::Email, NotificationChannel::Mobile])
    }

    pub fn quality_check_failed(user_id: i64, average_score: f64) -> Self {
        Self::new(
            user_id,
            NotificationType::QualityCheckFailed,
            "Quality Check Failed",
            format!(
                "Your images didn't meet our quality standards. Average score: {:.1}/100. Please try again with higher quality images.",
                average_score
            ),
        )
        .with_channels(vec![NotificationChannel::Email, NotificationChannel::Mobile])
    }

    pub fn sale_made(user_id: i64, image_title: &str, amount: f64) -> Self {
        Self::new(
            user_id,
            NotificationType::SaleMade,
            "New Sale! 💰",
            format!(
                "Your image \"{}\" was sold for ${:.2}. Earnings will be processed in your next payout.",
                image_title, amount
            ),
        )
    }

    pub fn payout_processed(user_id: i64, amount: f64) -> Self {
        Self::new(
            user_id,
            NotificationType::PayoutProcessed,
            "Payout Processed",
            format!(
                "Your payout of ${:.2} has been processed and will arrive in your account within 2-3 business days.",
                amount
            ),
        )
    }

    pub fn bank_details_saved(user_id: i64) -> Self {
        Self::new(
            user_id,
            NotificationType::AccountUpdate,
            "Bank Details Added",
            "Your bank details have been securely saved. You can now receive payments for your photo sales.",
        )
    }

    pub fn images_submitted(user_id: i64, count: usize) -> Self {
        let noun = if count == 1 { "image" } else { "images" };
        Self::new(
            user_id,
            NotificationType::AccountUpdate,
            "Images Submitted Successfully! 📤",
            format!(
                "{} {} submitted for quality review. You'll be notified once the review is complete.",
                count, noun
            ),
        )
    }

    pub fn upload_welcome(user_id: i64) -> Self {
        Self::new(
            user_id,
            NotificationType::AccountUpdate,
            "Welcome to Image Upload! 🎉",
            "Ready to start earning from your photography? Upload up to 5 images and our AI will help generate metadata for better discoverability.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_wire_format() {
        let json = serde_json::to_string(&NotificationType::QualityCheckPassed).unwrap();
        assert_eq!(json, "\"QUALITY_CHECK_PASSED\"");
        let parsed: NotificationType = serde_json::from_str("\"SALE_MADE\"").unwrap();
        assert_eq!(parsed, NotificationType::SaleMade);
        assert_eq!("account_update".parse::<NotificationType>().unwrap(), NotificationType::AccountUpdate);
    }

    #[test]
    fn test_channel_encoding() {
        let encoded = encode_channels(&[NotificationChannel::Email, NotificationChannel::Mobile]);
        assert_eq!(encoded, r#"["email","mobile"]"#);
        assert_eq!(
            decode_channels(&encoded),
            vec![NotificationChannel::Email, NotificationChannel::Mobile]
        );
        assert_eq!(decode_channels("not json"), vec![NotificationChannel::Email]);
        assert_eq!(decode_channels(r#"["pigeon"]"#), vec![NotificationChannel::Email]);
    }

    #[test]
    fn test_templates() {
        let sale = NewNotification::sale_made(1, "Sunset", 2.5);
        assert_eq!(sale.kind, NotificationType::SaleMade);
        assert!(sale.message.contains("$2.50"));

        let failed = NewNotification::quality_check_failed(1, 62.345);
        assert!(failed.message.contains("62.3/100"));
        assert_eq!(failed.channels.len(), 2);

        assert!(NewNotification::images_submitted(1, 1).message.starts_with("1 image submitted"));
        assert!(NewNotification::images_submitted(1, 3).message.starts_with("3 images submitted"));

        let rejected = NewNotification::image_rejected(1, "Dunes", None);
        assert!(rejected.message.ends_with("Please review our quality guidelines."));
        let rejected = NewNotification::image_rejected(1, "Dunes", Some("blurry"));
        assert!(rejected.message.ends_with("Reason: blurry"));
    }

    #[test]
    fn test_serialized_shape() {
        let notification = Notification {
            id: 3,
            user_id: 1,
            kind: NotificationType::AccountUpdate,
            title: "t".to_string(),
            message: "m".to_string(),
            read: false,
            channels: vec![NotificationChannel::Email],
            sent_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "ACCOUNT_UPDATE");
        assert_eq!(json["channels"][0], "email");
        assert!(json.get("createdAt").is_some());
    }
}
