//! Image lifecycle
//!
//! Accepts uploads, writes them to the upload directory and walks each image
//! through the simulated review pipeline on its own tokio task:
//! uploading → analyzing → completed, then after submission
//! submitting → submitted → quality-testing → approved → published.
//! Published images hand over to the activity simulation.

use crate::config::{LifecycleConfig, UploadConfig};
use crate::models::{ImageRecord, ImageStatus, NewNotification, PruneResult};
use crate::services::earnings;
use crate::services::image_store::{ImageStore, ImageStoreError};
use crate::services::metadata::suggest_metadata;
use crate::services::notification::NotificationService;
use crate::services::quality_check::{probe_image, UploadedImage};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] ImageStoreError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFile {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub images: Vec<ImageRecord>,
    pub rejected: Vec<RejectedFile>,
    /// Set when part of the batch was dropped to respect the limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct LifecycleService {
    store: Arc<ImageStore>,
    notifications: Arc<NotificationService>,
    config: LifecycleConfig,
    upload: UploadConfig,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Held from the slot count until the batch is in the store
    upload_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl LifecycleService {
    pub fn new(
        store: Arc<ImageStore>,
        notifications: Arc<NotificationService>,
        config: LifecycleConfig,
        upload: UploadConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            config,
            upload,
            tasks: Mutex::new(HashMap::new()),
            upload_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<ImageStore> {
        &self.store
    }

    fn upload_lock(&self, user_id: i64) -> Arc<AsyncMutex<()>> {
        let mut locks = self.upload_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user_id).or_default().clone()
    }

    /// Accept a batch of files and start processing them.
    ///
    /// Only `max_batch` images may sit in the working set at once; files
    /// beyond the free slots are dropped and the outcome says so.
    pub async fn upload(
        &self,
        user_id: i64,
        mut files: Vec<UploadedImage>,
    ) -> Result<UploadOutcome, LifecycleError> {
        if files.is_empty() {
            return Err(LifecycleError::ValidationError(
                "No files provided".to_string(),
            ));
        }

        let lock = self.upload_lock(user_id);
        let _guard = lock.lock().await;

        let max = self.upload.max_batch;
        let slots = max.saturating_sub(self.store.working_set_count(user_id).await);
        if slots == 0 {
            return Err(LifecycleError::ValidationError(format!(
                "Maximum {} images allowed. Please remove some images first.",
                max
            )));
        }

        let mut message = None;
        if files.len() > slots {
            message = Some(format!(
                "You can only add {} more image(s). Maximum {} images allowed.",
                slots, max
            ));
            files.truncate(slots);
        }

        let first_upload = self.store.list(user_id).await.is_empty();

        let mut records = Vec::with_capacity(files.len());
        let mut rejected = Vec::new();
        for file in files {
            match self.store_file(user_id, &file).await {
                Ok(record) => records.push(record),
                Err(LifecycleError::ValidationError(reason)) => {
                    rejected.push(RejectedFile {
                        filename: file.filename,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if records.is_empty() {
            let reason = rejected
                .first()
                .map(|r| format!("{}: {}", r.filename, r.reason))
                .unwrap_or_else(|| "No valid images".to_string());
            return Err(LifecycleError::ValidationError(reason));
        }

        let images = self.store.add_images(records).await;
        tracing::info!(user_id, count = images.len(), "Accepted image upload");

        if first_upload {
            self.notifications
                .notify(NewNotification::upload_welcome(user_id))
                .await;
        }
        for image in &images {
            self.start_processing(image);
        }

        Ok(UploadOutcome {
            images,
            rejected,
            message,
        })
    }

    /// Validate one file and write it to the upload directory
    async fn store_file(
        &self,
        user_id: i64,
        file: &UploadedImage,
    ) -> Result<ImageRecord, LifecycleError> {
        let size = file.bytes.len() as u64;
        if size > self.upload.max_file_size {
            return Err(LifecycleError::ValidationError(format!(
                "File exceeds maximum size of {} bytes",
                self.upload.max_file_size
            )));
        }

        let probe = probe_image(&file.bytes);
        let mime = match probe.format {
            Some(format) if self.upload.is_type_allowed(format.to_mime_type()) => {
                format.to_mime_type()
            }
            _ => {
                return Err(LifecycleError::ValidationError(
                    "Unsupported file type".to_string(),
                ))
            }
        };

        let id = Uuid::new_v4().to_string();
        let stored_name = format!("{}.{}", id, self.upload.get_extension(mime));
        tokio::fs::create_dir_all(&self.upload.path)
            .await
            .context("Failed to create upload directory")?;
        tokio::fs::write(self.upload.path.join(&stored_name), &file.bytes)
            .await
            .with_context(|| format!("Failed to store {}", stored_name))?;

        let mut record = ImageRecord::new(
            id,
            user_id,
            file.filename.clone(),
            format!("/uploads/{}", stored_name),
        );
        record.size = size;
        record.width = probe.width;
        record.height = probe.height;
        record.format = mime.trim_start_matches("image/").to_string();
        Ok(record)
    }

    fn track(&self, id: &str, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = tasks.insert(id.to_string(), handle) {
            previous.abort();
        }
    }

    fn abort(&self, ids: impl IntoIterator<Item = String>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            if let Some(handle) = tasks.remove(&id) {
                handle.abort();
            }
        }
    }

    fn start_processing(&self, image: &ImageRecord) {
        let store = self.store.clone();
        let config = self.config.clone();
        let id = image.id.clone();
        let name = image.name.clone();

        let handle = tokio::spawn(async move {
            let start = Instant::now();

            sleep_until(start + LifecycleConfig::ms(config.uploading_ms)).await;
            if store.update_progress(&id, 30).await.is_none() {
                return;
            }

            sleep_until(start + LifecycleConfig::ms(config.analyzing_ms)).await;
            if !advance(&store, &id, ImageStatus::Uploading, ImageStatus::Analyzing).await {
                return;
            }
            store.update_progress(&id, 60).await;

            sleep_until(start + LifecycleConfig::ms(config.completed_ms)).await;
            if let Some(image) = store.get_by_id(&id).await {
                if image.metadata.is_none() {
                    store.set_metadata(&id, suggest_metadata(&name)).await;
                }
            }
            if advance(&store, &id, ImageStatus::Analyzing, ImageStatus::Completed).await {
                store.update_progress(&id, 100).await;
            }
        });
        self.track(&image.id, handle);
    }

    /// Submit every completed image for review; returns how many were submitted.
    pub async fn submit_all(&self, user_id: i64) -> Result<usize, LifecycleError> {
        let completed = self
            .store
            .list_by_status(user_id, ImageStatus::Completed)
            .await;
        if completed.is_empty() {
            return Ok(0);
        }

        let count = completed.len();
        for (index, image) in completed.iter().enumerate() {
            self.store
                .update_status(&image.id, ImageStatus::Submitting)
                .await;
            // the first image of the batch announces the submission
            let announce = (index == 0).then_some(count);
            self.start_review(image, announce);
        }

        tracing::info!(user_id, count, "Submitted images for review");
        Ok(count)
    }

    fn start_review(&self, image: &ImageRecord, announce: Option<usize>) {
        let store = self.store.clone();
        let notifications = self.notifications.clone();
        let config = self.config.clone();
        let id = image.id.clone();
        let user_id = image.user_id;

        let handle = tokio::spawn(async move {
            let start = Instant::now();

            sleep_until(start + LifecycleConfig::ms(config.submitted_ms)).await;
            if !advance(&store, &id, ImageStatus::Submitting, ImageStatus::Submitted).await {
                return;
            }
            if let Some(count) = announce {
                notifications
                    .notify(NewNotification::images_submitted(user_id, count))
                    .await;
            }

            sleep_until(start + LifecycleConfig::ms(config.quality_testing_ms)).await;
            if !advance(&store, &id, ImageStatus::Submitted, ImageStatus::QualityTesting).await {
                return;
            }

            sleep_until(start + LifecycleConfig::ms(config.approved_ms)).await;
            if !advance(&store, &id, ImageStatus::QualityTesting, ImageStatus::Approved).await {
                return;
            }

            sleep(LifecycleConfig::ms(config.publish_delay_ms)).await;
            let published = store.publish(user_id, &id).await;
            match published {
                Ok(_) => earnings::run_simulation(store, notifications, config, id).await,
                Err(e) => tracing::debug!(image_id = %id, "Skipping automatic publish: {}", e),
            }
        });
        self.track(&image.id, handle);
    }

    fn start_activity(&self, image: &ImageRecord) {
        let handle = tokio::spawn(earnings::run_simulation(
            self.store.clone(),
            self.notifications.clone(),
            self.config.clone(),
            image.id.clone(),
        ));
        self.track(&image.id, handle);
    }

    /// Publish one approved image now instead of waiting for the timer
    pub async fn publish(&self, user_id: i64, id: &str) -> Result<ImageRecord, LifecycleError> {
        let image = self.store.publish(user_id, id).await?;
        self.start_activity(&image);
        Ok(image)
    }

    pub async fn publish_all_approved(&self, user_id: i64) -> Vec<ImageRecord> {
        let published = self.store.publish_all_approved(user_id).await;
        for image in &published {
            self.start_activity(image);
        }
        published
    }

    /// Remove all of the user's images, cancelling their timers
    pub async fn clear(&self, user_id: i64) -> usize {
        let removed = self.store.clear(user_id).await;
        self.discard(&removed).await;
        removed.len()
    }

    /// Keep only published images, cancelling the timers of the rest
    pub async fn keep_only_live(&self, user_id: i64) -> PruneResult {
        let (result, removed) = self.store.keep_only_live(user_id).await;
        self.discard(&removed).await;
        result
    }

    async fn discard(&self, removed: &[ImageRecord]) {
        self.abort(removed.iter().map(|image| image.id.clone()));
        for image in removed {
            if let Err(e) = remove_stored_file(&self.upload.path, &image.preview).await {
                tracing::warn!(image_id = %image.id, "Failed to delete stored file: {:#}", e);
            }
        }
    }

    /// Abort every pending timer (server shutdown)
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

/// Move `id` from `from` to `to`; false if the image is gone or has moved on.
async fn advance(store: &ImageStore, id: &str, from: ImageStatus, to: ImageStatus) -> bool {
    match store.get_by_id(id).await {
        Some(image) if image.status == from => store.update_status(id, to).await.is_some(),
        _ => false,
    }
}

async fn remove_stored_file(upload_dir: &Path, preview: &str) -> anyhow::Result<()> {
    let Some(name) = Path::new(preview).file_name() else {
        return Ok(());
    };
    match tokio::fs::remove_file(upload_dir.join(name)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
