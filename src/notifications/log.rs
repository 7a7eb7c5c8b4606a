//! Notification backend that only writes to the log

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;

use super::{Notification, NotificationBackend, NotificationChannel};
use crate::error::Result;

/// Used when no notification service is reachable (headless hosts, CI).
#[derive(Debug, Default)]
pub struct LogBackend {
    next_handle: AtomicU32,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationBackend for LogBackend {
    async fn show(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
        replaces: Option<u32>,
    ) -> Result<u32> {
        let handle = match replaces {
            Some(handle) => handle,
            None => self.next_handle.fetch_add(1, Ordering::Relaxed) + 1,
        };
        info!(
            channel = %channel.id,
            handle,
            replaced = replaces.is_some(),
            "[notification] {}: {}",
            notification.title,
            notification.body
        );
        Ok(handle)
    }

    async fn dismiss(&self, handle: u32) -> Result<()> {
        info!(handle, "[notification] dismissed");
        Ok(())
    }
}
