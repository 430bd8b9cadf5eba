//! Marketplace activity simulation for published images
//!
//! Each published image gets a burst of "initial" ticks followed by slower
//! "regular" ticks; every tick adds views and sometimes a sale.

use crate::config::LifecycleConfig;
use crate::models::NewNotification;
use crate::services::image_store::ImageStore;
use crate::services::notification::NotificationService;
use rand::Rng;
use std::sync::Arc;
use tokio::time::{interval_at, Instant};

/// Sales notifications stop once an image has sold more than this many times
pub const SALE_NOTIFICATION_LIMIT: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Regular,
}

impl Phase {
    fn view_factor(self) -> f64 {
        match self {
            Phase::Initial => 15.0,
            Phase::Regular => 8.0,
        }
    }

    fn sale_chance(self) -> f64 {
        match self {
            Phase::Initial => 0.3,
            Phase::Regular => 0.15,
        }
    }
}

/// Activity produced by one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActivityTick {
    pub views: u64,
    pub downloads: u64,
    pub earnings: f64,
}

pub fn popularity(category: &str) -> f64 {
    match category {
        "Nature & Landscape" => 1.4,
        "People & Lifestyle" => 1.3,
        "Food & Beverage" => 1.2,
        "Business & Technology" => 1.1,
        "Urban & Architecture" => 1.0,
        "Artistic & Creative" => 0.9,
        "Lifestyle & Wellness" => 1.2,
        "General" => 0.8,
        _ => 1.0,
    }
}

/// Earnings per download
pub fn rate(category: &str) -> f64 {
    match category {
        "Nature & Landscape" => 2.5,
        "People & Lifestyle" => 3.2,
        "Food & Beverage" => 2.8,
        "Business & Technology" => 4.1,
        "Urban & Architecture" => 2.3,
        "Artistic & Creative" => 1.9,
        "Lifestyle & Wellness" => 3.0,
        "General" => 1.8,
        _ => 2.0,
    }
}

pub fn simulate_tick<R: Rng + ?Sized>(phase: Phase, category: &str, rng: &mut R) -> ActivityTick {
    let popularity = popularity(category);
    let views = (rng.random::<f64>() * phase.view_factor() * popularity).floor() as u64 + 1;

    let mut tick = ActivityTick {
        views,
        ..Default::default()
    };
    if rng.random::<f64>() < phase.sale_chance() * popularity {
        let downloads = rng.random_range(1..=3u64);
        tick.downloads = downloads;
        tick.earnings = rate(category) * downloads as f64;
    }
    tick
}

/// Drive the activity of one published image until both phases have run.
///
/// Returns early if the image disappears or stops being published.
pub async fn run_simulation(
    store: Arc<ImageStore>,
    notifications: Arc<NotificationService>,
    config: LifecycleConfig,
    image_id: String,
) {
    let phases = [
        (Phase::Initial, config.initial_tick_ms, config.initial_window_ms),
        (Phase::Regular, config.regular_tick_ms, config.regular_window_ms),
    ];

    for (phase, tick_ms, window_ms) in phases {
        let tick = LifecycleConfig::ms(tick_ms.max(1));
        let start = Instant::now();
        let deadline = start + LifecycleConfig::ms(window_ms);
        let mut ticker = interval_at(start + tick, tick);

        loop {
            let at = ticker.tick().await;
            if at > deadline {
                break;
            }

            let Some(image) = store.get_by_id(&image_id).await else {
                return;
            };
            let activity = {
                let mut rng = rand::rng();
                simulate_tick(phase, image.category(), &mut rng)
            };

            let Some(updated) = store.apply_activity(&image_id, &activity).await else {
                return;
            };

            if activity.downloads > 0 {
                tracing::debug!(
                    image_id = %image_id,
                    downloads = activity.downloads,
                    earnings = activity.earnings,
                    "Simulated sale"
                );
                if updated.downloads <= SALE_NOTIFICATION_LIMIT {
                    notifications
                        .notify(NewNotification::sale_made(
                            updated.user_id,
                            updated.display_title(),
                            activity.earnings,
                        ))
                        .await;
                }
            }
        }
    }

    tracing::debug!(image_id = %image_id, "Activity simulation finished");
}
