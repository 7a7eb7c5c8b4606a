//! Networking screen: one request button and its result

use rmcp::{model::*, ErrorData as McpError};
use tokio::sync::Mutex;
use tracing::warn;

use super::UNSET;
use crate::error::Result;
use crate::network::{ApiClient, DataResponse};
use crate::shared::label;

#[derive(Debug, Default)]
pub struct NetworkingScreen {
    result: Option<String>,
}

impl NetworkingScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn label(&self) -> String {
        self.result().unwrap_or(UNSET).to_string()
    }

    /// Store the outcome of one request; on failure the previous result is
    /// kept as is.
    pub fn record(&mut self, response: Result<DataResponse>) -> Result<String> {
        match response {
            Ok(data) => Ok(self.result.insert(data.my_key).clone()),
            Err(e) => {
                warn!("Request failed, keeping previous result: {}", e);
                Err(e)
            }
        }
    }
}

// === Tool Functions ===

pub async fn fetch_data(
    screen: &Mutex<NetworkingScreen>,
    client: &ApiClient,
) -> std::result::Result<CallToolResult, McpError> {
    // The screen stays readable while the request is in flight
    let response = client.get_data().await;

    let mut screen = screen.lock().await;
    match screen.record(response) {
        Ok(value) => label(value),
        Err(e) => label(format!("{}\nResult: {}", e, screen.label())),
    }
}

pub async fn get_fetch_result(
    screen: &Mutex<NetworkingScreen>,
) -> std::result::Result<CallToolResult, McpError> {
    label(screen.lock().await.label())
}
