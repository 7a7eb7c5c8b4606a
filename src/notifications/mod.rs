//! Notifications area - channels and replaceable local notifications
//!
//! [`NotificationManager`] keeps the channel registry and the table of
//! visible notifications; a [`NotificationBackend`] does the actual
//! displaying. Posting twice with the same id replaces the first
//! notification instead of stacking a second one.

#[cfg(all(feature = "linux", target_os = "linux"))]
pub mod desktop;
pub mod log;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use futures::stream::{BoxStream, StreamExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{LabError, Result};

#[cfg(all(feature = "linux", target_os = "linux"))]
pub use desktop::DesktopBackend;
pub use log::LogBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Channel is blocked; nothing is shown
    None,
    Min,
    Low,
    Default,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Max,
}

/// Freedesktop urgency level: 0 low, 1 normal, 2 critical
pub fn urgency(importance: Importance, priority: Priority) -> u8 {
    match (importance, priority) {
        (Importance::High, _) | (_, Priority::Max) => 2,
        (Importance::Min | Importance::Low, _) | (_, Priority::Min | Priority::Low) => 0,
        _ => 1,
    }
}

/// A named category of user-visible alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub importance: Importance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
}

/// Something that can put a notification on screen.
pub trait NotificationBackend: Send + Sync {
    /// Show `notification`, replacing the one identified by `replaces` if
    /// given. Returns the backend's handle for the shown notification.
    fn show(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
        replaces: Option<u32>,
    ) -> impl Future<Output = Result<u32>> + Send;

    fn dismiss(&self, handle: u32) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
struct Posted {
    handle: u32,
    notification: Notification,
}

/// Channel registry plus the visible-notification table.
#[derive(Debug)]
pub struct NotificationManager<B> {
    backend: B,
    channels: Mutex<HashMap<String, NotificationChannel>>,
    posted: Mutex<BTreeMap<i32, Posted>>,
}

impl<B: NotificationBackend> NotificationManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            channels: Mutex::new(HashMap::new()),
            posted: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Register a channel. Re-creating an existing id updates its name and
    /// description but keeps the importance it was first created with.
    pub async fn create_channel(&self, channel: NotificationChannel) {
        let mut channels = self.channels.lock().await;
        match channels.get_mut(&channel.id) {
            Some(existing) => {
                existing.name = channel.name;
                existing.description = channel.description;
                debug!("Updated notification channel {}", existing.id);
            }
            None => {
                info!("Created notification channel {} ({:?})", channel.id, channel.importance);
                channels.insert(channel.id.clone(), channel);
            }
        }
    }

    pub async fn channel(&self, id: &str) -> Option<NotificationChannel> {
        self.channels.lock().await.get(id).cloned()
    }

    /// Post `notification` under `id`, replacing any visible one with the same id.
    ///
    /// Returns `false` when the channel is blocked and nothing was shown.
    pub async fn notify(&self, id: i32, notification: Notification) -> Result<bool> {
        let channel = self.channel(&notification.channel_id).await.ok_or_else(|| {
            LabError::NotificationFailure(format!(
                "No notification channel {:?}",
                notification.channel_id
            ))
        })?;

        if channel.importance == Importance::None {
            warn!("Channel {} is blocked, dropping notification {}", channel.id, id);
            return Ok(false);
        }

        let mut posted = self.posted.lock().await;
        let replaces = posted.get(&id).map(|p| p.handle);
        let handle = self.backend.show(&channel, &notification, replaces).await?;
        debug!("Notification {} shown as {} (replaced {:?})", id, handle, replaces);
        posted.insert(id, Posted { handle, notification });
        Ok(true)
    }

    /// Remove the notification posted under `id`. Returns whether one was visible.
    pub async fn cancel(&self, id: i32) -> Result<bool> {
        let mut posted = self.posted.lock().await;
        let Some(entry) = posted.remove(&id) else {
            return Ok(false);
        };
        if let Err(e) = self.backend.dismiss(entry.handle).await {
            posted.insert(id, entry);
            return Err(e);
        }
        Ok(true)
    }

    /// Forget the notification shown under backend `handle`, returning its id
    pub async fn forget(&self, handle: u32) -> Option<i32> {
        let mut posted = self.posted.lock().await;
        let id = posted
            .iter()
            .find(|(_, p)| p.handle == handle)
            .map(|(id, _)| *id)?;
        posted.remove(&id);
        Some(id)
    }

    /// Drop notifications from the table as the backend reports them closed.
    /// Runs until `closed` ends.
    pub async fn track_closed(&self, mut closed: BoxStream<'static, u32>) {
        while let Some(handle) = closed.next().await {
            if let Some(id) = self.forget(handle).await {
                debug!("Notification {} closed outside the server", id);
            }
        }
    }

    /// Visible notifications ordered by id.
    ///
    /// Closures made outside the server only show up here when the backend
    /// reports them and [`NotificationManager::track_closed`] is running.
    pub async fn active(&self) -> Vec<(i32, Notification)> {
        self.posted
            .lock()
            .await
            .iter()
            .map(|(id, p)| (*id, p.notification.clone()))
            .collect()
    }
}

/// Backend picked at start-up: the desktop notification service when it is
/// reachable, the log otherwise.
#[derive(Debug)]
pub enum PlatformBackend {
    #[cfg(all(feature = "linux", target_os = "linux"))]
    Desktop(DesktopBackend),
    Log(LogBackend),
}

impl PlatformBackend {
    pub async fn detect() -> Self {
        #[cfg(all(feature = "linux", target_os = "linux"))]
        match DesktopBackend::connect().await {
            Ok(desktop) => {
                info!("Using notification daemon {}", desktop.server());
                return PlatformBackend::Desktop(desktop);
            }
            Err(e) => warn!("Desktop notifications unavailable, logging instead: {}", e),
        }

        PlatformBackend::Log(LogBackend::new())
    }

    /// Stream of closed handles, for backends that report closures
    pub async fn closed_handles(&self) -> Option<BoxStream<'static, u32>> {
        match self {
            #[cfg(all(feature = "linux", target_os = "linux"))]
            PlatformBackend::Desktop(desktop) => match desktop.closed_handles().await {
                Ok(closed) => Some(closed),
                Err(e) => {
                    warn!("Notifications closed by the user will stay listed: {}", e);
                    None
                }
            },
            PlatformBackend::Log(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(all(feature = "linux", target_os = "linux"))]
            PlatformBackend::Desktop(_) => "desktop",
            PlatformBackend::Log(_) => "log",
        }
    }
}

impl NotificationBackend for PlatformBackend {
    async fn show(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
        replaces: Option<u32>,
    ) -> Result<u32> {
        match self {
            #[cfg(all(feature = "linux", target_os = "linux"))]
            PlatformBackend::Desktop(b) => b.show(channel, notification, replaces).await,
            PlatformBackend::Log(b) => b.show(channel, notification, replaces).await,
        }
    }

    async fn dismiss(&self, handle: u32) -> Result<()> {
        match self {
            #[cfg(all(feature = "linux", target_os = "linux"))]
            PlatformBackend::Desktop(b) => b.dismiss(handle).await,
            PlatformBackend::Log(b) => b.dismiss(handle).await,
        }
    }
}
