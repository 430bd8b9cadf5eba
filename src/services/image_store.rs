//! Image store
//!
//! In-memory list of every contributor's images with a broadcast channel
//! announcing each change. When a snapshot path is configured the whole list
//! is loaded on start and rewritten after every mutation.

use crate::models::{
    DebugInfo, ImageMetadata, ImageRecord, ImageStats, ImageStatus, MetadataPatch,
    NewNotification, PruneResult,
};
use crate::services::earnings::ActivityTick;
use crate::services::notification::NotificationService;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const EVENT_CAPACITY: usize = 256;

/// Change notifications published by the store
#[derive(Debug, Clone, PartialEq)]
pub enum ImageEvent {
    Added { user_id: i64, id: String },
    StatusChanged {
        user_id: i64,
        id: String,
        from: ImageStatus,
        to: ImageStatus,
    },
    Progress { id: String, progress: u8 },
    MetadataUpdated { id: String },
    Activity { id: String },
    Removed { user_id: i64, ids: Vec<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    #[error("Image not found")]
    NotFound,

    #[error("Only approved images can be published (current status: {0})")]
    NotApproved(ImageStatus),
}

pub struct ImageStore {
    images: RwLock<Vec<ImageRecord>>,
    events: broadcast::Sender<ImageEvent>,
    notifications: Arc<NotificationService>,
    snapshot_path: Option<PathBuf>,
}

impl ImageStore {
    /// In-memory store without a snapshot file
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            images: RwLock::new(Vec::new()),
            events,
            notifications,
            snapshot_path: None,
        }
    }

    /// Store backed by a JSON snapshot. A missing file starts empty.
    pub async fn open(
        notifications: Arc<NotificationService>,
        snapshot_path: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut store = Self::new(notifications);
        if let Some(path) = snapshot_path {
            let images = load_snapshot(&path).await?;
            tracing::info!("Loaded {} images from {}", images.len(), path.display());
            store.images = RwLock::new(images);
            store.snapshot_path = Some(path);
        }
        Ok(store)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImageEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ImageEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn persist(&self, images: &[ImageRecord]) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = write_snapshot(path, images).await {
            tracing::warn!("Failed to write image snapshot: {:#}", e);
        }
    }

    pub async fn add_images(&self, records: Vec<ImageRecord>) -> Vec<ImageRecord> {
        let mut images = self.images.write().await;
        images.extend(records.iter().cloned());
        self.persist(&images).await;
        drop(images);

        for record in &records {
            self.emit(ImageEvent::Added {
                user_id: record.user_id,
                id: record.id.clone(),
            });
        }
        records
    }

    /// Look up an image owned by `user_id`
    pub async fn get(&self, user_id: i64, id: &str) -> Option<ImageRecord> {
        self.images
            .read()
            .await
            .iter()
            .find(|image| image.id == id && image.user_id == user_id)
            .cloned()
    }

    pub(crate) async fn get_by_id(&self, id: &str) -> Option<ImageRecord> {
        self.images
            .read()
            .await
            .iter()
            .find(|image| image.id == id)
            .cloned()
    }

    pub async fn list(&self, user_id: i64) -> Vec<ImageRecord> {
        self.images
            .read()
            .await
            .iter()
            .filter(|image| image.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn list_by_status(&self, user_id: i64, status: ImageStatus) -> Vec<ImageRecord> {
        self.images
            .read()
            .await
            .iter()
            .filter(|image| image.user_id == user_id && image.status == status)
            .cloned()
            .collect()
    }

    /// Images still counting against the upload limit
    pub async fn working_set_count(&self, user_id: i64) -> usize {
        self.images
            .read()
            .await
            .iter()
            .filter(|image| image.user_id == user_id && image.status.is_in_working_set())
            .count()
    }

    /// Move an image to `status`.
    ///
    /// Entering `approved` from any other status sends the approval
    /// notification exactly once.
    pub async fn update_status(&self, id: &str, status: ImageStatus) -> Option<ImageRecord> {
        let mut images = self.images.write().await;
        let image = images.iter_mut().find(|image| image.id == id)?;
        let from = image.status;
        image.status = status;
        let updated = image.clone();
        self.persist(&images).await;
        drop(images);

        if from != status {
            tracing::debug!(image_id = id, %from, to = %status, "Image status changed");
            self.emit(ImageEvent::StatusChanged {
                user_id: updated.user_id,
                id: updated.id.clone(),
                from,
                to: status,
            });
            if status == ImageStatus::Approved {
                self.notifications
                    .notify(NewNotification::image_approved(
                        updated.user_id,
                        updated.display_title(),
                    ))
                    .await;
            }
        }
        Some(updated)
    }

    pub async fn update_progress(&self, id: &str, progress: u8) -> Option<ImageRecord> {
        let mut images = self.images.write().await;
        let image = images.iter_mut().find(|image| image.id == id)?;
        image.progress = progress.min(100);
        let updated = image.clone();
        self.persist(&images).await;
        drop(images);

        self.emit(ImageEvent::Progress {
            id: updated.id.clone(),
            progress: updated.progress,
        });
        Some(updated)
    }

    /// Replace the metadata wholesale (analysis result)
    pub async fn set_metadata(&self, id: &str, metadata: ImageMetadata) -> Option<ImageRecord> {
        let mut images = self.images.write().await;
        let image = images.iter_mut().find(|image| image.id == id)?;
        image.metadata = Some(metadata);
        let updated = image.clone();
        self.persist(&images).await;
        drop(images);

        self.emit(ImageEvent::MetadataUpdated {
            id: updated.id.clone(),
        });
        Some(updated)
    }

    /// Merge a partial metadata edit from the owner
    pub async fn update_metadata(
        &self,
        user_id: i64,
        id: &str,
        patch: MetadataPatch,
    ) -> Result<ImageRecord, ImageStoreError> {
        let mut images = self.images.write().await;
        let image = images
            .iter_mut()
            .find(|image| image.id == id && image.user_id == user_id)
            .ok_or(ImageStoreError::NotFound)?;
        image.metadata.get_or_insert_with(ImageMetadata::default).merge(patch);
        let updated = image.clone();
        self.persist(&images).await;
        drop(images);

        self.emit(ImageEvent::MetadataUpdated {
            id: updated.id.clone(),
        });
        Ok(updated)
    }

    /// Publish one approved image
    pub async fn publish(&self, user_id: i64, id: &str) -> Result<ImageRecord, ImageStoreError> {
        let current = self.get(user_id, id).await.ok_or(ImageStoreError::NotFound)?;
        if current.status != ImageStatus::Approved {
            return Err(ImageStoreError::NotApproved(current.status));
        }
        self.update_status(id, ImageStatus::Published)
            .await
            .ok_or(ImageStoreError::NotFound)
    }

    /// Publish every approved image of the user; returns the published ones
    pub async fn publish_all_approved(&self, user_id: i64) -> Vec<ImageRecord> {
        let approved = self.list_by_status(user_id, ImageStatus::Approved).await;
        let mut published = Vec::with_capacity(approved.len());
        for image in approved {
            if let Ok(record) = self.publish(user_id, &image.id).await {
                published.push(record);
            }
        }
        published
    }

    /// Add simulated marketplace activity. Only published images accrue.
    pub async fn apply_activity(&self, id: &str, tick: &ActivityTick) -> Option<ImageRecord> {
        let mut images = self.images.write().await;
        let image = images
            .iter_mut()
            .find(|image| image.id == id && image.status == ImageStatus::Published)?;
        image.views += tick.views;
        image.downloads += tick.downloads;
        image.earnings += tick.earnings;
        let updated = image.clone();
        self.persist(&images).await;
        drop(images);

        self.emit(ImageEvent::Activity {
            id: updated.id.clone(),
        });
        Some(updated)
    }

    pub async fn stats(&self, user_id: i64) -> ImageStats {
        let images = self.images.read().await;
        ImageStats::from_images(images.iter().filter(|image| image.user_id == user_id))
    }

    pub async fn debug_info(&self, user_id: i64) -> DebugInfo {
        let images = self.images.read().await;
        DebugInfo::from_images(images.iter().filter(|image| image.user_id == user_id))
    }

    /// Remove every image of the user; returns the removed records
    pub async fn clear(&self, user_id: i64) -> Vec<ImageRecord> {
        self.remove_where(user_id, |_| true).await
    }

    /// Drop everything that is not published
    pub async fn keep_only_live(&self, user_id: i64) -> (PruneResult, Vec<ImageRecord>) {
        let removed = self
            .remove_where(user_id, |image| image.status != ImageStatus::Published)
            .await;
        let kept = self.list_by_status(user_id, ImageStatus::Published).await.len();
        (
            PruneResult {
                kept,
                removed: removed.len(),
            },
            removed,
        )
    }

    async fn remove_where(
        &self,
        user_id: i64,
        predicate: impl Fn(&ImageRecord) -> bool,
    ) -> Vec<ImageRecord> {
        let mut images = self.images.write().await;
        let (removed, kept): (Vec<ImageRecord>, Vec<ImageRecord>) = images
            .drain(..)
            .partition(|image| image.user_id == user_id && predicate(image));
        *images = kept;
        if !removed.is_empty() {
            self.persist(&images).await;
        }
        drop(images);

        if !removed.is_empty() {
            self.emit(ImageEvent::Removed {
                user_id,
                ids: removed.iter().map(|image| image.id.clone()).collect(),
            });
        }
        removed
    }
}

async fn load_snapshot(path: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse image snapshot {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read image snapshot {}", path.display())),
    }
}

/// Write to a sibling temp file, then rename over the snapshot
async fn write_snapshot(path: &Path, images: &[ImageRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create snapshot directory")?;
        }
    }
    let json = serde_json::to_vec_pretty(images).context("Failed to encode images")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .context("Failed to write snapshot")?;
    tokio::fs::rename(&tmp, path)
        .await
        .context("Failed to replace snapshot")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::NotificationType;
    use crate::services::notification::tests::setup_service;

    pub(crate) fn record(user_id: i64, name: &str) -> ImageRecord {
        ImageRecord::new(
            uuid::Uuid::new_v4().to_string(),
            user_id,
            name.to_string(),
            format!("/uploads/{}", name),
        )
    }

    async fn setup() -> (ImageStore, Arc<NotificationService>) {
        let (_pool, notifications) = setup_service().await;
        let notifications = Arc::new(notifications);
        (ImageStore::new(notifications.clone()), notifications)
    }

    #[tokio::test]
    async fn test_add_and_list_scoped_by_user() {
        let (store, _) = setup().await;
        let added = store
            .add_images(vec![record(1, "a.jpg"), record(1, "b.jpg"), record(2, "c.jpg")])
            .await;

        assert_eq!(store.list(1).await.len(), 2);
        assert_eq!(store.list(2).await.len(), 1);
        assert!(store.get(2, &added[0].id).await.is_none());
        assert_eq!(store.get(1, &added[0].id).await.unwrap().name, "a.jpg");
        assert_eq!(store.working_set_count(1).await, 2);
    }

    #[tokio::test]
    async fn test_approval_notifies_once() {
        let (store, notifications) = setup().await;
        let image = store.add_images(vec![record(1, "a.jpg")]).await.remove(0);
        let mut events = store.subscribe();

        store.update_status(&image.id, ImageStatus::Approved).await.unwrap();
        store.update_status(&image.id, ImageStatus::Approved).await.unwrap();

        let list = notifications.list(1, None, false).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, NotificationType::ImageApproved);
        assert!(list[0].message.contains("a.jpg"));

        match events.recv().await.unwrap() {
            ImageEvent::StatusChanged { from, to, .. } => {
                assert_eq!(from, ImageStatus::Uploading);
                assert_eq!(to, ImageStatus::Approved);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_requires_approval() {
        let (store, _) = setup().await;
        let image = store.add_images(vec![record(1, "a.jpg")]).await.remove(0);

        assert!(matches!(
            store.publish(1, &image.id).await,
            Err(ImageStoreError::NotApproved(ImageStatus::Uploading))
        ));
        assert!(matches!(
            store.publish(1, "missing").await,
            Err(ImageStoreError::NotFound)
        ));

        store.update_status(&image.id, ImageStatus::Approved).await;
        assert!(matches!(
            store.publish(2, &image.id).await,
            Err(ImageStoreError::NotFound)
        ));
        let published = store.publish(1, &image.id).await.unwrap();
        assert_eq!(published.status, ImageStatus::Published);
    }

    #[tokio::test]
    async fn test_activity_only_for_published_and_stats() {
        let (store, _) = setup().await;
        let images = store
            .add_images(vec![record(1, "a.jpg"), record(1, "b.jpg"), record(1, "c.jpg")])
            .await;
        let tick = ActivityTick {
            views: 10,
            downloads: 2,
            earnings: 5.0,
        };

        assert!(store.apply_activity(&images[0].id, &tick).await.is_none());

        store.update_status(&images[0].id, ImageStatus::Published).await;
        store.update_status(&images[1].id, ImageStatus::QualityTesting).await;
        store.apply_activity(&images[0].id, &tick).await.unwrap();
        store.apply_activity(&images[0].id, &tick).await.unwrap();

        let stats = store.stats(1).await;
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.published_images, 1);
        assert_eq!(stats.pending_images, 1);
        assert_eq!(stats.total_views, 20);
        assert_eq!(stats.total_downloads, 4);
        assert_eq!(stats.total_earnings, 10.0);
    }

    #[tokio::test]
    async fn test_metadata_patch_merges() {
        let (store, _) = setup().await;
        let image = store.add_images(vec![record(1, "a.jpg")]).await.remove(0);
        let patch = MetadataPatch {
            title: Some("Sunrise".to_string()),
            tags: Some((0..10).map(|i| format!("t{}", i)).collect()),
            ..Default::default()
        };

        let updated = store.update_metadata(1, &image.id, patch).await.unwrap();
        let meta = updated.metadata.unwrap();
        assert_eq!(meta.title, "Sunrise");
        assert_eq!(meta.tags.len(), crate::models::MAX_TAGS);
        assert!(store
            .update_metadata(2, &image.id, MetadataPatch::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_keep_only_live_and_clear() {
        let (store, _) = setup().await;
        let images = store
            .add_images(vec![record(1, "a.jpg"), record(1, "b.jpg"), record(2, "c.jpg")])
            .await;
        store.update_status(&images[0].id, ImageStatus::Published).await;

        let (result, removed) = store.keep_only_live(1).await;
        assert_eq!(result, PruneResult { kept: 1, removed: 1 });
        assert_eq!(removed[0].id, images[1].id);

        assert_eq!(store.clear(1).await.len(), 1);
        assert!(store.list(1).await.is_empty());
        assert_eq!(store.list(2).await.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("images.json");
        let (_pool, notifications) = setup_service().await;
        let notifications = Arc::new(notifications);

        let store = ImageStore::open(notifications.clone(), Some(path.clone()))
            .await
            .unwrap();
        let image = store.add_images(vec![record(7, "kept.jpg")]).await.remove(0);
        store.update_status(&image.id, ImageStatus::Submitted).await;

        let reopened = ImageStore::open(notifications, Some(path)).await.unwrap();
        let loaded = reopened.get(7, &image.id).await.unwrap();
        assert_eq!(loaded.status, ImageStatus::Submitted);
        assert_eq!(loaded.name, "kept.jpg");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{not json").unwrap();
        let (_pool, notifications) = setup_service().await;
        assert!(
            ImageStore::open(Arc::new(notifications), Some(file.path().to_path_buf()))
                .await
                .is_err()
        );
    }
}
