// REST client for the joystick mapping service
// Covers input-device control plus mapping and device configuration CRUD

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use joymap_monitor::{InputBackend, MonitorError};

/// Default service address
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// The service answered but declined the request
    #[error("{0}")]
    Rejected(String),
}

/// Input device the service can read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDevice {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub is_gamepad: bool,
}

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<InputDevice>,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    device_path: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    success: bool,
    device_name: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// One event-to-key mapping.
///
/// Only `type` and `description` are interpreted; everything else is carried
/// through unchanged so new mapping kinds survive a get/put cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(rename = "type", default = "unknown_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

impl Mapping {
    /// Short description of the target keys, e.g. `ctrl + c` or `+d / -a`
    pub fn summary(&self) -> String {
        let field = |name: &str| self.fields.get(name).map(display_value);
        match self.kind.as_str() {
            "keyboard" => field("key").unwrap_or_default(),
            "keyboard_combo" => self
                .fields
                .get("combo")
                .and_then(Value::as_array)
                .map(|keys| {
                    keys.iter()
                        .map(display_value)
                        .collect::<Vec<_>>()
                        .join(" + ")
                })
                .unwrap_or_default(),
            "dpad_horizontal" | "dpad_vertical" => format!(
                "+{} / -{}",
                field("positive_key").unwrap_or_default(),
                field("negative_key").unwrap_or_default()
            ),
            _ => String::new(),
        }
    }

    /// Type label as shown in listings
    pub fn kind_label(&self) -> &str {
        match self.kind.as_str() {
            "keyboard" => "Key",
            "keyboard_combo" => "Combo",
            "dpad_horizontal" => "D-Pad horizontal",
            "dpad_vertical" => "D-Pad vertical",
            other => other,
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// All mappings of the configured virtual device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSet {
    pub device_name: String,
    #[serde(default)]
    pub mappings: BTreeMap<String, Mapping>,
}

impl MappingSet {
    /// Mappings matching `kind` exactly and containing `search` in their event
    /// name, case-insensitively
    pub fn filter<'a>(
        &'a self,
        kind: Option<&'a str>,
        search: Option<&str>,
    ) -> impl Iterator<Item = (&'a String, &'a Mapping)> + 'a {
        let search = search.map(str::to_lowercase).unwrap_or_default();
        self.mappings.iter().filter(move |(name, mapping)| {
            kind.map_or(true, |k| mapping.kind == k) && name.to_lowercase().contains(&search)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceInfo {
    pub device_name: String,
    #[serde(default)]
    pub config_path: String,
    #[serde(default)]
    pub mappings_count: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AvailableKeys {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// Acknowledgement of a mutating request
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub mappings_count: Option<usize>,
}

/// Async client for the mapping service
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------
    // Input devices
    // ------------------------------------------------------------------

    pub async fn list_input_devices(&self) -> Result<Vec<InputDevice>, ApiError> {
        let list: DeviceList = self.get("/api/input/devices").await?;
        Ok(list.devices)
    }

    /// Ask the service to start reading `device_path`; returns its name.
    ///
    /// Falls back to the path when the service reports no name.
    pub async fn connect_input(&self, device_path: &str) -> Result<String, ApiError> {
        let response = self
            .request(Method::POST, "/api/input/connect")
            .json(&ConnectRequest { device_path })
            .send()
            .await?;
        let status = response.status();
        // Error responses carry the same body shape
        let body: ConnectResponse = response.json().await.unwrap_or_default();

        if status.is_success() && body.success {
            Ok(body.device_name.unwrap_or_else(|| device_path.to_string()))
        } else {
            Err(ApiError::Rejected(body.error.unwrap_or_else(|| {
                format!("Connect failed ({})", status.as_u16())
            })))
        }
    }

    pub async fn disconnect_input(&self) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/api/input/disconnect")
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mappings
    // ------------------------------------------------------------------

    pub async fn mappings(&self) -> Result<MappingSet, ApiError> {
        self.get("/api/mappings").await
    }

    pub async fn mapping(&self, event_name: &str) -> Result<Mapping, ApiError> {
        let mut found: BTreeMap<String, Mapping> =
            self.get(&format!("/api/mappings/{event_name}")).await?;
        found
            .remove(event_name)
            .ok_or_else(|| ApiError::NotFound(event_name.to_string()))
    }

    pub async fn put_mapping(&self, event_name: &str, mapping: &Mapping) -> Result<(), ApiError> {
        let response = self
            .request(Method::PUT, &format!("/api/mappings/{event_name}"))
            .json(mapping)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn delete_mapping(&self, event_name: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::DELETE, &format!("/api/mappings/{event_name}"))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Device and configuration
    // ------------------------------------------------------------------

    pub async fn device_info(&self) -> Result<DeviceInfo, ApiError> {
        self.get("/api/device").await
    }

    pub async fn set_device_name(&self, device_name: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::PUT, "/api/device/name")
            .json(&serde_json::json!({ "device_name": device_name }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn reload(&self) -> Result<Ack, ApiError> {
        let response = self.request(Method::POST, "/api/reload").send().await?;
        parse(check(response).await?).await
    }

    /// Full configuration document, unmodified
    pub async fn export(&self) -> Result<Value, ApiError> {
        self.get("/api/export").await
    }

    pub async fn import(&self, document: &Value) -> Result<Ack, ApiError> {
        if !document.is_object() {
            return Err(ApiError::ParseError(
                "configuration must be a JSON object".to_string(),
            ));
        }
        let response = self
            .request(Method::POST, "/api/import")
            .json(document)
            .send()
            .await?;
        parse(check(response).await?).await
    }

    pub async fn available_keys(&self) -> Result<AvailableKeys, ApiError> {
        self.get("/api/keys").await
    }

    /// `true` when the service reports `ok`
    pub async fn health(&self) -> Result<bool, ApiError> {
        let status: Value = self.get("/health").await?;
        Ok(status.get("status").and_then(Value::as_str) == Some("ok"))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path).send().await?;
        parse(check(response).await?).await
    }
}

/// Turn non-2xx responses into errors, using the service's `error` field
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    if status == StatusCode::NOT_FOUND {
        Err(ApiError::NotFound(message))
    } else {
        Err(ApiError::ServerError {
            status: status.as_u16(),
            message,
        })
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::ParseError(e.to_string()))
}

#[async_trait]
impl InputBackend for ApiClient {
    async fn connect(&self, device_path: &str) -> Result<String, MonitorError> {
        self.connect_input(device_path).await.map_err(|e| match e {
            ApiError::Rejected(reason) => MonitorError::ConnectRejected(reason),
            other => MonitorError::Backend(other.to_string()),
        })
    }

    async fn disconnect(&self) -> Result<(), MonitorError> {
        self.disconnect_input()
            .await
            .map_err(|e| MonitorError::Backend(e.to_string()))
    }
}
