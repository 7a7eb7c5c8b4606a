//! Desktop notifications over the freedesktop D-Bus notification service

use std::collections::HashMap;

use futures::stream::{BoxStream, StreamExt};
use zbus::{zvariant::Value, Connection};

use super::{urgency, Notification, NotificationBackend, NotificationChannel};
use crate::error::{LabError, Result};

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;

    fn get_server_information(&self) -> zbus::Result<(String, String, String, String)>;

    #[zbus(signal)]
    fn notification_closed(&self, id: u32, reason: u32) -> zbus::Result<()>;
}

/// Session-bus notification daemon (dunst, mako, GNOME Shell, ...).
pub struct DesktopBackend {
    proxy: NotificationsProxy<'static>,
    server: String,
}

impl DesktopBackend {
    pub async fn connect() -> Result<Self> {
        let connection = Connection::session().await.map_err(|e| {
            LabError::NotificationFailure(format!("Failed to connect to session bus: {}", e))
        })?;
        let proxy = NotificationsProxy::new(&connection).await.map_err(|e| {
            LabError::NotificationFailure(format!("Failed to create notifications proxy: {}", e))
        })?;

        // Fails fast when no daemon owns the name
        let (name, vendor, version, _protocol_version) = proxy.get_server_information().await.map_err(|e| {
            LabError::NotificationFailure(format!("No notification daemon: {}", e))
        })?;
        let server = format!("{} {} ({})", name, version, vendor);
        Ok(Self { proxy, server })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Ids the daemon reports as closed: expired, dismissed by the user or
    /// closed by us.
    pub async fn closed_handles(&self) -> Result<BoxStream<'static, u32>> {
        let signals = self.proxy.receive_notification_closed().await.map_err(|e| {
            LabError::NotificationFailure(format!("Failed to watch NotificationClosed: {}", e))
        })?;

        Ok(signals
            .filter_map(|signal| async move { signal.args().ok().map(|args| args.id) })
            .boxed())
    }
}

impl std::fmt::Debug for DesktopBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopBackend")
            .field("server", &self.server)
            .finish()
    }
}

impl NotificationBackend for DesktopBackend {
    async fn show(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
        replaces: Option<u32>,
    ) -> Result<u32> {
        let mut hints: HashMap<&str, Value<'_>> = HashMap::new();
        hints.insert(
            "urgency",
            Value::U8(urgency(channel.importance, notification.priority)),
        );
        hints.insert("category", Value::from(channel.id.as_str()));

        self.proxy
            .notify(
                &channel.name,
                replaces.unwrap_or(0),
                "",
                &notification.title,
                &notification.body,
                &[],
                hints,
                -1,
            )
            .await
            .map_err(|e| LabError::NotificationFailure(format!("Notify failed: {}", e)))
    }

    async fn dismiss(&self, handle: u32) -> Result<()> {
        self.proxy
            .close_notification(handle)
            .await
            .map_err(|e| LabError::NotificationFailure(format!("CloseNotification failed: {}", e)))
    }
}
