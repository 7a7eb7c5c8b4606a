//! Networking area - JSON fetch from the configured backend

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::error::{LabError, Result};

const DATA_PATH: &str = "data.json";

/// Body returned by `GET data.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataResponse {
    #[serde(rename = "myKey")]
    pub my_key: String,
}

/// HTTP client bound to one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("rmcp-devicelab/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs.filter(|secs| *secs > 0) {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| LabError::NetworkFailure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    /// Client over a caller-built `reqwest::Client`
    #[cfg(test)]
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET <base>/data.json`, decoded. Single attempt, no retry.
    pub async fn get_data(&self) -> Result<DataResponse> {
        let url = self
            .base_url
            .join(DATA_PATH)
            .map_err(|e| LabError::NetworkFailure(format!("Invalid request URL: {}", e)))?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LabError::NetworkFailure(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!("GET {} returned {}", url, response.status());
            return Err(LabError::NetworkFailure(format!(
                "Server returned status: {}",
                response.status()
            )));
        }

        response
            .json::<DataResponse>()
            .await
            .map_err(|e| LabError::NetworkFailure(format!("Failed to parse response: {}", e)))
    }
}

/// Parse the base URL and make sure relative paths resolve below it
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| LabError::NetworkFailure(format!("Invalid base URL {:?}: {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response, returning the base URL and the request line
    pub(crate) async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{}", addr), handle)
    }

    /// Accept one connection and never answer it
    pub(crate) async fn serve_silent() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        (format!("http://{}", addr), handle)
    }

    pub(crate) fn client_for(base_url: &str) -> ApiClient {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        ApiClient::with_http(http, base_url).unwrap()
    }

    #[test]
    fn test_client_from_config() {
        let client = ApiClient::new(&NetworkConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "http://172.24.224.1:8000/");

        let bad = ApiClient::new(&NetworkConfig {
            base_url: "::".to_string(),
            timeout_secs: None,
        });
        assert!(matches!(bad, Err(LabError::NetworkFailure(_))));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(
            parse_base_url("http://172.24.224.1:8000").unwrap().as_str(),
            "http://172.24.224.1:8000/"
        );
        let nested = parse_base_url("http://example.com/api").unwrap();
        assert_eq!(nested.join(DATA_PATH).unwrap().as_str(), "http://example.com/api/data.json");
        assert!(matches!(parse_base_url("not a url"), Err(LabError::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_get_data_decodes_my_key() {
        let (base, server) = serve_once("200 OK", r#"{"myKey": "abc"}"#).await;
        let data = client_for(&base).get_data().await.unwrap();
        assert_eq!(data.my_key, "abc");
        assert_eq!(server.await.unwrap(), "GET /data.json HTTP/1.1");
    }

    #[tokio::test]
    async fn test_malformed_body_is_network_failure() {
        let (base, _server) = serve_once("200 OK", r#"{"otherKey": 1}"#).await;
        let result = client_for(&base).get_data().await;
        assert!(matches!(result, Err(LabError::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_error_status_is_network_failure() {
        let (base, _server) = serve_once("500 Internal Server Error", "{}").await;
        let result = client_for(&base).get_data().await;
        assert!(matches!(result, Err(LabError::NetworkFailure(msg)) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client_for(&format!("http://{}", addr)).get_data().await;
        assert!(matches!(result, Err(LabError::NetworkFailure(_))));
    }
}
