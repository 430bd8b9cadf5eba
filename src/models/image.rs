//! Image records tracked by the lifecycle simulator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Review pipeline position of an image, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageStatus {
    Uploading,
    Analyzing,
    Completed,
    Submitting,
    Submitted,
    QualityTesting,
    Approved,
    Published,
}

impl ImageStatus {
    pub const ALL: [ImageStatus; 8] = [
        ImageStatus::Uploading,
        ImageStatus::Analyzing,
        ImageStatus::Completed,
        ImageStatus::Submitting,
        ImageStatus::Submitted,
        ImageStatus::QualityTesting,
        ImageStatus::Approved,
        ImageStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Uploading => "uploading",
            ImageStatus::Analyzing => "analyzing",
            ImageStatus::Completed => "completed",
            ImageStatus::Submitting => "submitting",
            ImageStatus::Submitted => "submitted",
            ImageStatus::QualityTesting => "quality-testing",
            ImageStatus::Approved => "approved",
            ImageStatus::Published => "published",
        }
    }

    /// Still on the upload page: counts against the batch limit
    pub fn is_in_working_set(&self) -> bool {
        matches!(
            self,
            ImageStatus::Uploading | ImageStatus::Analyzing | ImageStatus::Completed
        )
    }

    /// Waiting on review
    pub fn is_pending_review(&self) -> bool {
        matches!(self, ImageStatus::Submitted | ImageStatus::QualityTesting)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ImageStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Invalid image status: {}", s))
    }
}

/// Marketplace metadata attached once analysis completes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub title: String,
    pub caption: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub category: String,
}

pub const MAX_KEYWORDS: usize = 10;
pub const MAX_TAGS: usize = 6;

impl ImageMetadata {
    /// Apply a partial update. Keyword and tag lists are capped.
    pub fn merge(&mut self, patch: MetadataPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(caption) = patch.caption {
            self.caption = caption;
        }
        if let Some(mut keywords) = patch.keywords {
            keywords.truncate(MAX_KEYWORDS);
            self.keywords = keywords;
        }
        if let Some(mut tags) = patch.tags {
            tags.truncate(MAX_TAGS);
            self.tags = tags;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
    }
}

/// Partial metadata update from the client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.caption.is_none()
            && self.keywords.is_none()
            && self.tags.is_none()
            && self.category.is_none()
    }
}

/// One uploaded image and its simulated marketplace activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub user_id: i64,
    pub name: String,
    /// Public URL of the stored file
    pub preview: String,
    pub status: ImageStatus,
    pub progress: u8,
    pub upload_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub earnings: f64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub format: String,
}

impl ImageRecord {
    /// Fresh upload with zeroed activity counters
    pub fn new(id: String, user_id: i64, name: String, preview: String) -> Self {
        Self {
            id,
            user_id,
            name,
            preview,
            status: ImageStatus::Uploading,
            progress: 0,
            upload_date: Utc::now(),
            metadata: None,
            views: 0,
            downloads: 0,
            earnings: 0.0,
            size: 0,
            width: 0,
            height: 0,
            format: String::new(),
        }
    }

    /// Title used in notifications: metadata title, falling back to the file name
    pub fn display_title(&self) -> &str {
        match &self.metadata {
            Some(metadata) if !metadata.title.is_empty() => &metadata.title,
            _ => &self.name,
        }
    }

    pub fn category(&self) -> &str {
        match &self.metadata {
            Some(metadata) if !metadata.category.is_empty() => &metadata.category,
            _ => "General",
        }
    }
}

/// Dashboard counters. Activity totals only count published images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub total_images: usize,
    pub published_images: usize,
    pub approved_images: usize,
    pub pending_images: usize,
    pub total_earnings: f64,
    pub total_views: u64,
    pub total_downloads: u64,
}

impl ImageStats {
    pub fn from_images<'a>(images: impl IntoIterator<Item = &'a ImageRecord>) -> Self {
        let mut stats = ImageStats::default();
        for image in images {
            stats.total_images += 1;
            match image.status {
                ImageStatus::Published => {
                    stats.published_images += 1;
                    stats.total_earnings += image.earnings;
                    stats.total_views += image.views;
                    stats.total_downloads += image.downloads;
                }
                ImageStatus::Approved => stats.approved_images += 1,
                status if status.is_pending_review() => stats.pending_images += 1,
                _ => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugImage {
    pub id: String,
    pub name: String,
    pub status: ImageStatus,
    pub upload_date: DateTime<Utc>,
}

/// Per-status breakdown for troubleshooting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub images: Vec<DebugImage>,
}

impl DebugInfo {
    pub fn from_images<'a>(images: impl IntoIterator<Item = &'a ImageRecord>) -> Self {
        let mut by_status: BTreeMap<String, usize> = ImageStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        let mut list = Vec::new();

        for image in images {
            *by_status.entry(image.status.as_str().to_string()).or_default() += 1;
            list.push(DebugImage {
                id: image.id.clone(),
                name: image.name.clone(),
                status: image.status,
                upload_date: image.upload_date,
            });
        }

        Self {
            total: list.len(),
            by_status,
            images: list,
        }
    }
}

/// Outcome of pruning the store down to published images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneResult {
    pub kept: usize,
    pub removed: usize,
}
