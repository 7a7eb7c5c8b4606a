//! Notifications screen: post and cancel replaceable notifications

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use crate::config::NotificationsConfig;
use crate::notifications::{Notification, NotificationBackend, NotificationManager, Priority};
use crate::shared::label;

/// Id used by the notify button
pub const DEFAULT_ID: i32 = 1;

// === Parameter Types ===

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PostNotificationParams {
    #[schemars(description = "Notification id; posting an existing id replaces it (default 1)")]
    #[serde(default)]
    pub id: Option<i32>,
    #[schemars(description = "Title (default from config)")]
    #[serde(default)]
    pub title: Option<String>,
    #[schemars(description = "Body text (default from config)")]
    #[serde(default)]
    pub body: Option<String>,
    #[schemars(description = "Priority: min, low, default, high or max")]
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NotificationIdParams {
    #[schemars(description = "Notification id (default 1)")]
    #[serde(default)]
    pub id: Option<i32>,
}

// === Tool Functions ===

pub async fn post_notification<B: NotificationBackend>(
    manager: &NotificationManager<B>,
    config: &NotificationsConfig,
    params: PostNotificationParams,
) -> std::result::Result<CallToolResult, McpError> {
    let id = params.id.unwrap_or(DEFAULT_ID);
    let notification = Notification {
        channel_id: config.channel_id.clone(),
        title: params.title.unwrap_or_else(|| config.title.clone()),
        body: params.body.unwrap_or_else(|| config.body.clone()),
        priority: params.priority.unwrap_or_default(),
    };

    match manager.notify(id, notification).await {
        Ok(true) => label(format!("Posted notification {}", id)),
        Ok(false) => label(format!(
            "Notification {} suppressed: channel {} is blocked",
            id, config.channel_id
        )),
        Err(e) => {
            warn!("Notification {} failed: {}", id, e);
            label(format!("Error: {}", e))
        }
    }
}

pub async fn cancel_notification<B: NotificationBackend>(
    manager: &NotificationManager<B>,
    params: NotificationIdParams,
) -> std::result::Result<CallToolResult, McpError> {
    let id = params.id.unwrap_or(DEFAULT_ID);
    match manager.cancel(id).await {
        Ok(true) => label(format!("Cancelled notification {}", id)),
        Ok(false) => label(format!("No notification {}", id)),
        Err(e) => {
            warn!("Notification {} failed: {}", id, e);
            label(format!("Error: {}", e))
        }
    }
}

pub async fn list_notifications<B: NotificationBackend>(
    manager: &NotificationManager<B>,
) -> std::result::Result<CallToolResult, McpError> {
    let active = manager.active().await;
    if active.is_empty() {
        return label("No active notifications");
    }

    let mut out = format!("Active notifications ({}):\n", active.len());
    for (id, n) in active {
        out.push_str(&format!(
            "  [{}] {} - {} ({:?}, {})\n",
            id, n.title, n.body, n.priority, n.channel_id
        ));
    }
    label(out)
}
