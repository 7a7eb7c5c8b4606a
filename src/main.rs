//! rmcp-devicelab: MCP server exposing a small device lab
//!
//! Four screens behind one tool surface:
//! - datastore: a persisted counter with live change notification
//! - networking: a single JSON GET against a configurable base URL
//! - sensors: sensor listing and a live reading of the default sensor
//! - notifications: replaceable notifications on a registered channel

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    ErrorData as McpError,
    ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::datastore::{CounterStore, PreferencesStore};
use crate::network::ApiClient;
use crate::notifications::{NotificationManager, PlatformBackend};
use crate::screens::{datastore as counter_tools, networking, notifications as notify_tools};
use crate::screens::{sensors as sensor_tools, NetworkingScreen, SensorsScreen};
use crate::sensors::{HostSensors, SensorPlatform};

// === Modules ===

mod config;
mod datastore;
mod error;
mod network;
mod notifications;
mod screens;
mod sensors;
mod shared;

// === CLI ===

#[derive(Parser)]
#[command(name = "rmcp-devicelab")]
#[command(about = "MCP server for a small device lab: counter, HTTP fetch, sensors, notifications")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the config file in your editor
    Config,
    /// Print the sensors found on this machine and exit
    Sensors,
}

// === Common Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

// === Server ===

#[derive(Debug)]
pub struct DeviceLabServer {
    pub tool_router: ToolRouter<Self>,
    config: Config,
    counter: CounterStore,
    api: ApiClient,
    networking: Mutex<NetworkingScreen>,
    sensors: Arc<dyn SensorPlatform>,
    sensors_screen: Mutex<Option<SensorsScreen>>,
    notifications: Arc<NotificationManager<PlatformBackend>>,
}

impl DeviceLabServer {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let mut tool_router = Self::tool_router();

        for tool_name in &config.disabled {
            if tool_router.has_route(tool_name) {
                tool_router.remove_route(tool_name);
                tracing::info!("Disabled tool: {}", tool_name);
            } else {
                tracing::warn!("Config disables unknown tool: {}", tool_name);
            }
        }

        let directory = config
            .datastore
            .resolved_directory()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let store = Arc::new(PreferencesStore::open(&directory, &config.datastore.name));
        let counter = CounterStore::new(store.clone(), config.datastore.counter_key.clone());
        tracing::info!("Counter {} stored in {}", counter.key(), store.path().display());

        let api = ApiClient::new(&config.network)?;
        tracing::info!("Fetching from {}", api.base_url());

        let backend = PlatformBackend::detect().await;
        tracing::info!("Notification backend: {}", backend.name());
        let notifications = Arc::new(NotificationManager::new(backend));
        notifications
            .create_channel(config.notifications.channel())
            .await;
        if let Some(closed) = notifications.backend().closed_handles().await {
            let manager = notifications.clone();
            tokio::spawn(async move { manager.track_closed(closed).await });
        }

        Ok(Self {
            tool_router,
            config,
            counter,
            api,
            networking: Mutex::new(NetworkingScreen::new()),
            sensors: Arc::new(HostSensors::new()),
            sensors_screen: Mutex::new(None),
            notifications,
        })
    }
}

// Tool implementations
#[rmcp::tool_router]
impl DeviceLabServer {
    // ============================================================
    // DATASTORE
    // ============================================================

    #[rmcp::tool(description = "Read the persisted counter")]
    pub async fn get_counter(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        counter_tools::get_counter(&self.counter).await
    }

    #[rmcp::tool(description = "Press the increment button: add one to the persisted counter and return the new value")]
    pub async fn increment_counter(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        counter_tools::increment_counter(&self.counter).await
    }

    #[rmcp::tool(description = "Wait until the counter changes (from any writer) or the timeout passes, then return its value")]
    pub async fn wait_counter_change(
        &self,
        Parameters(params): Parameters<counter_tools::WaitChangeParams>,
    ) -> Result<CallToolResult, McpError> {
        counter_tools::wait_counter_change(&self.counter, params).await
    }

    // ============================================================
    // NETWORKING
    // ============================================================

    #[rmcp::tool(description = "Press the request button: GET data.json from the configured base URL and show its myKey field")]
    pub async fn fetch_data(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        networking::fetch_data(&self.networking, &self.api).await
    }

    #[rmcp::tool(description = "Show the result of the last successful request, or null")]
    pub async fn get_fetch_result(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        networking::get_fetch_result(&self.networking).await
    }

    // ============================================================
    // SENSORS
    // ============================================================

    #[rmcp::tool(description = "List every sensor on this machine with its type and vendor")]
    pub async fn list_sensors(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        sensor_tools::list_sensors(self.sensors.as_ref()).await
    }

    #[rmcp::tool(description = "Show the default sensor of a kind (accelerometer unless configured otherwise)")]
    pub async fn get_default_sensor(
        &self,
        Parameters(params): Parameters<sensor_tools::SensorKindParams>,
    ) -> Result<CallToolResult, McpError> {
        sensor_tools::get_default_sensor(self.sensors.as_ref(), &self.config.sensors, params).await
    }

    #[rmcp::tool(description = "Open the sensors screen: start listening to the default sensor of a kind at a sampling rate. Replaces any open sensors screen.")]
    pub async fn open_sensors_screen(
        &self,
        Parameters(params): Parameters<sensor_tools::OpenScreenParams>,
    ) -> Result<CallToolResult, McpError> {
        sensor_tools::open_sensors_screen(
            self.sensors.as_ref(),
            &self.sensors_screen,
            &self.config.sensors,
            params,
        )
        .await
    }

    #[rmcp::tool(description = "Render the open sensors screen: error, latest reading and sensor list")]
    pub async fn read_sensors_screen(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        sensor_tools::read_sensors_screen(&self.sensors_screen).await
    }

    #[rmcp::tool(description = "Close the sensors screen and stop listening to its sensor")]
    pub async fn close_sensors_screen(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        sensor_tools::close_sensors_screen(&self.sensors_screen).await
    }

    // ============================================================
    // NOTIFICATIONS
    // ============================================================

    #[rmcp::tool(description = "Press the notify button: post a notification on the lab channel. Posting the same id again replaces it.")]
    pub async fn post_notification(
        &self,
        Parameters(params): Parameters<notify_tools::PostNotificationParams>,
    ) -> Result<CallToolResult, McpError> {
        notify_tools::post_notification(self.notifications.as_ref(), &self.config.notifications, params).await
    }

    #[rmcp::tool(description = "Cancel a posted notification by id")]
    pub async fn cancel_notification(
        &self,
        Parameters(params): Parameters<notify_tools::NotificationIdParams>,
    ) -> Result<CallToolResult, McpError> {
        notify_tools::cancel_notification(self.notifications.as_ref(), params).await
    }

    #[rmcp::tool(description = "List the notifications currently shown, by id")]
    pub async fn list_notifications(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        notify_tools::list_notifications(self.notifications.as_ref()).await
    }
}

#[rmcp::tool_handler]
impl ServerHandler for DeviceLabServer {
    fn get_info(&self) -> ServerInfo {
        let mut description = String::from("rmcp-devicelab: a small device lab.\n");
        description.push_str("- datastore: persisted counter (get, increment, wait for change)\n");
        description.push_str("- networking: fetch data.json and show its result\n");
        description.push_str("- sensors: list sensors, open a live sensors screen\n");
        description.push_str(&format!(
            "- notifications: post and cancel on channel {} ({})\n",
            self.config.notifications.channel_id,
            self.notifications.backend().name()
        ));

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(description),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config) => {
            run_config_command(cli.config)?;
        }
        Some(Commands::Sensors) => {
            run_sensors_command();
        }
        None => {
            run_server(cli.config).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Config {
    match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
}

/// Open config file in user's editor
fn run_config_command(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = path
        .or_else(Config::path)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create config file from template if it doesn't exist
    if !config_path.exists() {
        let template = include_str!("../devicelab.toml.example");
        std::fs::write(&config_path, template)?;
        println!("Created config file: {}", config_path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            { "notepad".to_string() }
            #[cfg(not(target_os = "windows"))]
            { "nano".to_string() }
        });

    println!("Opening {} with {}", config_path.display(), editor);

    std::process::Command::new(&editor)
        .arg(&config_path)
        .status()?;

    Ok(())
}

/// Print the host sensor list
fn run_sensors_command() {
    let sensors = HostSensors::new().list_sensors();
    if sensors.is_empty() {
        println!("No sensors found");
        return;
    }
    for sensor in sensors {
        println!("{}\n  type: {}\n  vendor: {}", sensor.name, sensor.sensor_type, sensor.vendor);
    }
}

/// Run the MCP server
async fn run_server(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting rmcp-devicelab server");

    let server = DeviceLabServer::new(load_config(config_path)).await?;
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    tracing::info!("rmcp-devicelab server stopped");
    Ok(())
}
