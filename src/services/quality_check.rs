//! Quality check
//!
//! Scores a small batch of sample photographs and decides whether a new
//! contributor may start selling. The score is a heuristic over resolution,
//! file size and format plus a random composition factor.

use crate::config::QualityCheckConfig;
use crate::models::NewNotification;
use crate::services::notification::NotificationService;
use crate::services::user::{UserService, UserServiceError};
use image::{ImageFormat, ImageReader};
use rand::Rng;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;

const MIN_GOOD_SIZE: u64 = 2 * 1024 * 1024;
const MAX_GOOD_SIZE: u64 = 50 * 1024 * 1024;

/// Upper bound (exclusive) of the composition factor
pub const COMPOSITION_RANGE: f64 = 20.0;

#[derive(Debug, thiserror::Error)]
pub enum QualityCheckError {
    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    User(#[from] UserServiceError),
}

/// A file received from the multipart form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes,
        }
    }
}

/// What could be read from the image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProbe {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
    pub size: u64,
}

/// Read dimensions and format without decoding pixels.
///
/// Unreadable data yields a zero-sized probe with no format.
pub fn probe_image(bytes: &[u8]) -> ImageProbe {
    let size = bytes.len() as u64;
    let reader = match ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => {
            return ImageProbe {
                width: 0,
                height: 0,
                format: None,
                size,
            }
        }
    };

    let format = reader.format();
    match reader.into_dimensions() {
        Ok((width, height)) => ImageProbe {
            width,
            height,
            format,
            size,
        },
        Err(e) => {
            tracing::debug!("Could not read image dimensions: {}", e);
            ImageProbe {
                width: 0,
                height: 0,
                format: None,
                size,
            }
        }
    }
}

pub fn format_name(format: Option<ImageFormat>) -> &'static str {
    match format {
        Some(ImageFormat::Jpeg) => "jpeg",
        Some(ImageFormat::Png) => "png",
        Some(ImageFormat::WebP) => "webp",
        Some(_) => "other",
        None => "unknown",
    }
}

/// Score one image in `[0, 100]`.
pub fn score_image(probe: &ImageProbe, composition: f64) -> f64 {
    let mut score = 0.0;

    let longer = probe.width.max(probe.height);
    let shorter = probe.width.min(probe.height);
    if longer >= 2000 {
        score += 30.0;
    }
    if shorter >= 1500 {
        score += 20.0;
    }
    if probe.size > MIN_GOOD_SIZE && probe.size < MAX_GOOD_SIZE {
        score += 20.0;
    }
    if matches!(probe.format, Some(ImageFormat::Jpeg) | Some(ImageFormat::Png)) {
        score += 10.0;
    }
    score += composition.clamp(0.0, COMPOSITION_RANGE);

    score.min(100.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAssessment {
    pub filename: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub success: bool,
    pub passed: bool,
    pub average_score: f64,
    pub images: Vec<ImageAssessment>,
}

/// Score a batch with the given composition source. Pure apart from `composition`.
pub fn assess_batch(
    images: &[UploadedImage],
    threshold: f64,
    mut composition: impl FnMut() -> f64,
) -> QualityReport {
    let mut raw_total = 0.0;
    let assessments: Vec<ImageAssessment> = images
        .iter()
        .map(|image| {
            let probe = probe_image(&image.bytes);
            let score = score_image(&probe, composition());
            raw_total += score;
            ImageAssessment {
                filename: image.filename.clone(),
                size: probe.size,
                width: probe.width,
                height: probe.height,
                format: format_name(probe.format).to_string(),
                quality_score: round_one_decimal(score),
            }
        })
        .collect();

    // pass/fail is decided on the unrounded average
    let average = if assessments.is_empty() {
        0.0
    } else {
        raw_total / assessments.len() as f64
    };

    QualityReport {
        success: true,
        passed: !assessments.is_empty() && average >= threshold,
        average_score: round_one_decimal(average),
        images: assessments,
    }
}

pub struct QualityCheckService {
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    config: QualityCheckConfig,
}

impl QualityCheckService {
    pub fn new(
        users: Arc<UserService>,
        notifications: Arc<NotificationService>,
        config: QualityCheckConfig,
    ) -> Self {
        Self {
            users,
            notifications,
            config,
        }
    }

    /// Score the batch, record the outcome on the user and notify them.
    pub async fn evaluate(
        &self,
        user_id: i64,
        images: Vec<UploadedImage>,
    ) -> Result<QualityReport, QualityCheckError> {
        if images.is_empty() {
            return Err(QualityCheckError::ValidationError(
                "No images provided".to_string(),
            ));
        }
        if images.len() > self.config.max_images {
            return Err(QualityCheckError::ValidationError(format!(
                "Maximum {} images allowed",
                self.config.max_images
            )));
        }

        let report = {
            let mut rng = rand::rng();
            assess_batch(&images, self.config.pass_threshold, || {
                rng.random_range(0.0..COMPOSITION_RANGE)
            })
        };

        self.users.record_quality_check(user_id, report.passed).await?;

        tracing::info!(
            user_id,
            passed = report.passed,
            average_score = report.average_score,
            "Quality check completed"
        );

        let notification = if report.passed {
            NewNotification::quality_check_passed(user_id)
        } else {
            NewNotification::quality_check_failed(user_id, report.average_score)
        };
        self.notifications.notify(notification).await;

        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{SqlxNotificationRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ContributorStatus, NotificationType};
    use crate::services::user::RegisterInput;
    use proptest::prelude::*;

    /// Encode a blank image of the given size
    pub(crate) fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).expect("encode test image");
        out.into_inner()
    }

    fn probe(width: u32, height: u32, format: Option<ImageFormat>, size: u64) -> ImageProbe {
        ImageProbe {
            width,
            height,
            format,
            size,
        }
    }

    #[test]
    fn test_probe_png() {
        let bytes = encoded_image(64, 32, ImageFormat::Png);
        let p = probe_image(&bytes);
        assert_eq!((p.width, p.height), (64, 32));
        assert_eq!(p.format, Some(ImageFormat::Png));
        assert_eq!(p.size, bytes.len() as u64);
    }

    #[test]
    fn test_probe_garbage() {
        let p = probe_image(b"definitely not an image");
        assert_eq!((p.width, p.height), (0, 0));
        assert_eq!(p.format, None);
        assert_eq!(format_name(p.format), "unknown");
    }

    #[test]
    fn test_score_components() {
        let big = probe(4000, 3000, Some(ImageFormat::Jpeg), 5 * 1024 * 1024);
        assert_eq!(score_image(&big, 0.0), 80.0);
        assert!((score_image(&big, 19.5) - 99.5).abs() < 1e-9);
        assert_eq!(score_image(&big, 25.0), 100.0);

        // portrait orientation counts the longer side
        let tall = probe(1500, 2500, Some(ImageFormat::Png), 1024);
        assert_eq!(score_image(&tall, 0.0), 60.0);

        let webp = probe(800, 600, Some(ImageFormat::WebP), 3 * 1024 * 1024);
        assert_eq!(score_image(&webp, 5.0), 25.0);

        // size bounds are exclusive
        let edge = probe(10, 10, None, MIN_GOOD_SIZE);
        assert_eq!(score_image(&edge, 0.0), 0.0);
    }

    #[test]
    fn test_assess_batch_average_and_threshold() {
        let images = vec![
            UploadedImage::new("a.png", None, encoded_image(20, 20, ImageFormat::Png)),
            UploadedImage::new("b.txt", None, b"text".to_vec()),
        ];
        let report = assess_batch(&images, 70.0, || 10.0);
        // png: 10 + 10, garbage: 10
        assert_eq!(report.images[0].quality_score, 20.0);
        assert_eq!(report.images[1].quality_score, 10.0);
        assert_eq!(report.average_score, 15.0);
        assert!(!report.passed);
        assert!(report.success);

        let lenient = assess_batch(&images, 15.0, || 10.0);
        assert!(lenient.passed);
    }

    #[test]
    fn test_pass_decision_uses_unrounded_average() {
        // 30 + 20 + 10 from resolution and format, size below 2 MB
        let images = vec![UploadedImage::new(
            "wide.png",
            None,
            encoded_image(2000, 1500, ImageFormat::Png),
        )];

        let short = assess_batch(&images, 70.0, || 9.96);
        assert_eq!(short.average_score, 70.0);
        assert_eq!(short.images[0].quality_score, 70.0);
        assert!(!short.passed);

        let exact = assess_batch(&images, 70.0, || 10.0);
        assert_eq!(exact.average_score, 70.0);
        assert!(exact.passed);
    }

    async fn setup() -> (QualityCheckService, Arc<NotificationService>, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.unwrap();
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let users = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
        ));
        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool),
            user_repo,
            10,
        ));
        let user = users
            .register(RegisterInput::new("a@example.com", "password123"))
            .await
            .unwrap();
        let service = QualityCheckService::new(
            users,
            notifications.clone(),
            QualityCheckConfig::default(),
        );
        (service, notifications, user.id)
    }

    #[tokio::test]
    async fn test_evaluate_small_images_fails_and_notifies() {
        let (service, notifications, user_id) = setup().await;
        let report = service
            .evaluate(
                user_id,
                vec![UploadedImage::new(
                    "tiny.png",
                    Some("image/png".to_string()),
                    encoded_image(16, 16, ImageFormat::Png),
                )],
            )
            .await
            .unwrap();
        // at most 10 + 20 for a tiny png
        assert!(!report.passed);
        assert!(report.average_score < 30.0);

        let user = service.users.get_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.status, ContributorStatus::Rejected);
        assert!(!user.quality_check_passed);

        let list = notifications.list(user_id, None, false).await.unwrap();
        assert_eq!(list[0].kind, NotificationType::QualityCheckFailed);
        assert_eq!(list[0].channels.len(), 2);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_empty_and_oversized_batches() {
        let (service, _, user_id) = setup().await;
        assert!(matches!(
            service.evaluate(user_id, vec![]).await,
            Err(QualityCheckError::ValidationError(_))
        ));

        let many = (0..6)
            .map(|i| UploadedImage::new(format!("{}.png", i), None, vec![0u8; 4]))
            .collect();
        assert!(matches!(
            service.evaluate(user_id, many).await,
            Err(QualityCheckError::ValidationError(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn score_is_bounded(
            width in 0u32..10_000,
            height in 0u32..10_000,
            size in 0u64..100_000_000,
            composition in -50.0f64..50.0,
            is_jpeg in any::<bool>()
        ) {
            let format = if is_jpeg { Some(ImageFormat::Jpeg) } else { None };
            let score = score_image(&probe(width, height, format, size), composition);
            prop_assert!((0.0..=100.0).contains(&score));
        }

        #[test]
        fn score_grows_with_composition(
            width in 0u32..5000,
            height in 0u32..5000,
            low in 0.0f64..10.0,
            extra in 0.0f64..10.0
        ) {
            let p = probe(width, height, Some(ImageFormat::Png), 1024);
            prop_assert!(score_image(&p, low + extra) >= score_image(&p, low));
        }
    }
}
