//! DataStore screen: counter label and increment button

use std::time::Duration;

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::datastore::{CounterStore, CounterSubscription};
use crate::error::Result;
use crate::shared::{format_duration, label};

// === Parameter Types ===

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct WaitChangeParams {
    #[schemars(description = "Seconds to wait for the counter to change (default 30)")]
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug)]
pub struct DataStoreScreen {
    counter: CounterStore,
    subscription: CounterSubscription,
}

impl DataStoreScreen {
    /// Subscribe to the counter for as long as the screen is shown
    pub async fn enter(counter: CounterStore) -> Result<Self> {
        let subscription = counter.subscribe().await?;
        Ok(Self {
            counter,
            subscription,
        })
    }

    pub fn value(&self) -> i64 {
        self.subscription.current()
    }

    pub fn label(&self) -> String {
        format!("Current value: {}", self.value())
    }

    /// Button press: one transactional increment
    pub async fn on_click(&self) -> Result<i64> {
        self.counter.increment().await
    }

    /// Wait for the next value pushed by any writer
    pub async fn next_change(&mut self) -> Option<i64> {
        self.subscription.changed().await
    }

    pub fn exit(self) {
        self.subscription.unsubscribe();
        debug!(
            "Left datastore screen, {} counter subscribers remain",
            self.counter.subscriber_count()
        );
    }
}

// === Tool Functions ===

pub async fn get_counter(counter: &CounterStore) -> std::result::Result<CallToolResult, McpError> {
    match counter.read().await {
        Ok(value) => label(format!("Current value: {}", value)),
        Err(e) => {
            warn!("Counter tool failed: {}", e);
            label(format!("Error: {}", e))
        }
    }
}

pub async fn increment_counter(
    counter: &CounterStore,
) -> std::result::Result<CallToolResult, McpError> {
    let screen = match DataStoreScreen::enter(counter.clone()).await {
        Ok(screen) => screen,
        Err(e) => {
            warn!("Counter subscription failed: {}", e);
            return label(format!("Error: {}", e));
        }
    };

    let clicked = screen.on_click().await;
    screen.exit();
    match clicked {
        Ok(value) => label(format!("Current value: {}", value)),
        Err(e) => {
            warn!("Counter tool failed: {}", e);
            label(format!("Error: {}", e))
        }
    }
}

pub async fn wait_counter_change(
    counter: &CounterStore,
    params: WaitChangeParams,
) -> std::result::Result<CallToolResult, McpError> {
    let mut screen = match DataStoreScreen::enter(counter.clone()).await {
        Ok(screen) => screen,
        Err(e) => {
            warn!("Counter subscription failed: {}", e);
            return label(format!("Error: {}", e));
        }
    };

    let timeout = Duration::from_secs(params.timeout_secs.unwrap_or(30));
    let text = match tokio::time::timeout(timeout, screen.next_change()).await {
        Ok(Some(_)) => screen.label(),
        Ok(None) => "Counter store closed".to_string(),
        Err(_) => format!(
            "No change within {}. {}",
            format_duration(timeout),
            screen.label()
        ),
    };

    screen.exit();
    label(text)
}
