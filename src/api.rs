use anyhow::Context;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ActionError, FetchError};
use crate::model::{
    FetchRequest, PodAction, PodDescription, PodRef, RenderedTable, ResourceRecord,
};
use crate::normalize::{normalize, normalize_record};
use crate::sort::local_display;
use crate::table::{build_key_value_table, build_record_table};

pub const UPLOAD_PATH: &str = "/upload_kubeconfig";
pub const UPLOAD_FIELD: &str = "kubeconfig";
pub const EVENT_TIMESTAMP_COLUMN: &str = "timestamp";
const LOADBALANCER_IP_COLUMN: &str = "service_loadbalancer_ip";

const MIB: f64 = 1_048_576.0;

/// Status and raw body of one HTTP exchange.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The HTTP seam. Errors are transport-level only; status handling belongs to the gateway.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpReply, String>>;

    fn post<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpReply, String>>;

    fn upload<'a>(
        &'a self,
        path: &'a str,
        field: &'a str,
        file_name: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<HttpReply, String>>;
}

pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_reply(response: reqwest::Response) -> Result<HttpReply, String> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| format!("failed to read body: {error}"))?;
        Ok(HttpReply { status, body })
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpReply, String>> {
        async move {
            let response = self
                .client
                .get(self.url(path))
                .send()
                .await
                .map_err(|error| error.to_string())?;
            Self::read_reply(response).await
        }
        .boxed()
    }

    fn post<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpReply, String>> {
        async move {
            let response = self
                .client
                .post(self.url(path))
                .send()
                .await
                .map_err(|error| error.to_string())?;
            Self::read_reply(response).await
        }
        .boxed()
    }

    fn upload<'a>(
        &'a self,
        path: &'a str,
        field: &'a str,
        file_name: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<HttpReply, String>> {
        async move {
            let form = Form::new().part(field.to_string(), Part::bytes(bytes).file_name(file_name));
            let response = self
                .client
                .post(self.url(path))
                .multipart(form)
                .send()
                .await
                .map_err(|error| error.to_string())?;
            Self::read_reply(response).await
        }
        .boxed()
    }
}

/// Successful payload of one [`FetchRequest`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FetchPayload {
    Table(RenderedTable),
    ClusterVersion(String),
    Namespaces(Vec<String>),
    PodDetail(PodDescription),
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    items: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct ClusterInfoEnvelope {
    server_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    success: Option<bool>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    success: Option<bool>,
}

/// Client for the dashboard REST API.
#[derive(Clone)]
pub struct ApiGateway {
    transport: Arc<dyn Transport>,
}

impl ApiGateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchPayload, FetchError> {
        let path = request.path();
        let body = self.get_json(&path).await?;

        match request {
            FetchRequest::ClusterInfo => {
                let envelope: ClusterInfoEnvelope = decode(&path, body)?;
                envelope
                    .server_version
                    .map(FetchPayload::ClusterVersion)
                    .ok_or_else(|| FetchError::envelope(&path, "missing server_version"))
            }
            FetchRequest::Namespaces => {
                let envelope: ItemsEnvelope<String> = decode(&path, body)?;
                envelope
                    .items
                    .map(FetchPayload::Namespaces)
                    .ok_or_else(|| FetchError::envelope(&path, "missing items"))
            }
            FetchRequest::Events => {
                let records = collection(&path, body)?;
                let mut table = render_collection(&records)?;
                table.present_column(EVENT_TIMESTAMP_COLUMN, local_display);
                Ok(FetchPayload::Table(table))
            }
            FetchRequest::Nodes => {
                let records = collection(&path, body)?
                    .iter()
                    .map(node_summary)
                    .collect::<Vec<_>>();
                Ok(FetchPayload::Table(render_collection(&records)?))
            }
            FetchRequest::PersistentVolumes => {
                let records = collection(&path, body)?;
                Ok(FetchPayload::Table(render_collection(&records)?))
            }
            FetchRequest::Pods { .. } => {
                let records = collection(&path, body)?;
                let mut table = render_collection(&records)?;
                fill_blank_cells(&mut table, LOADBALANCER_IP_COLUMN, "N/A");
                Ok(FetchPayload::Table(table))
            }
            FetchRequest::PodDetail(pod) => describe_pod(&path, pod, body).map(FetchPayload::PodDetail),
        }
    }

    /// POSTs a pod action. `Ok` only when the server reports `success: true`.
    pub async fn run_action(&self, action: &PodAction) -> Result<(), ActionError> {
        let path = action.path();
        let reply = self
            .transport
            .post(&path)
            .await
            .map_err(|reason| FetchError::Transport {
                path: path.clone(),
                reason,
            })?;
        if !reply.is_success() {
            return Err(FetchError::HttpStatus {
                path,
                status: reply.status,
            }
            .into());
        }

        let body = parse_body(&path, &reply.body)?;
        let envelope: ActionEnvelope = decode(&path, body)?;
        match envelope.success {
            Some(true) => Ok(()),
            Some(false) => Err(ActionError::Rejected {
                reason: envelope
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
            None => Err(FetchError::envelope(&path, "missing success flag").into()),
        }
    }

    /// Uploads a credentials file and returns the server's `success` flag.
    ///
    /// The body is read whatever the status, since rejections arrive as 400 with `success: false`.
    pub async fn upload_credentials(
        &self,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<bool, FetchError> {
        let reply = self
            .transport
            .upload(UPLOAD_PATH, UPLOAD_FIELD, file_name, bytes)
            .await
            .map_err(|reason| FetchError::Transport {
                path: UPLOAD_PATH.to_string(),
                reason,
            })?;

        match serde_json::from_str::<UploadEnvelope>(&reply.body) {
            Ok(envelope) => Ok(envelope.success.unwrap_or(false)),
            Err(_) if !reply.is_success() => Err(FetchError::HttpStatus {
                path: UPLOAD_PATH.to_string(),
                status: reply.status,
            }),
            Err(error) => Err(FetchError::envelope(UPLOAD_PATH, error.to_string())),
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let reply = self
            .transport
            .get(path)
            .await
            .map_err(|reason| FetchError::Transport {
                path: path.to_string(),
                reason,
            })?;
        if !reply.is_success() {
            return Err(FetchError::HttpStatus {
                path: path.to_string(),
                status: reply.status,
            });
        }

        debug!("GET {path} -> {} ({} bytes)", reply.status, reply.body.len());
        parse_body(path, &reply.body)
    }
}

fn parse_body(path: &str, body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|error| FetchError::envelope(path, error.to_string()))
}

fn decode<T>(path: &str, body: Value) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(body).map_err(|error| FetchError::envelope(path, error.to_string()))
}

/// Validates `{items: [map]}` and returns the normalized records.
fn collection(path: &str, body: Value) -> Result<Vec<ResourceRecord>, FetchError> {
    let envelope: ItemsEnvelope<Value> = decode(path, body)?;
    let items = envelope
        .items
        .ok_or_else(|| FetchError::envelope(path, "missing items"))?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(normalize_record(&record)),
            other => Err(FetchError::envelope(
                path,
                format!("item {index} is not an object: {other}"),
            )),
        })
        .collect()
}

fn render_collection(records: &[ResourceRecord]) -> Result<RenderedTable, FetchError> {
    if records.is_empty() {
        return Ok(RenderedTable::default());
    }
    Ok(build_record_table(records)?)
}

/// Only touches `header` when the first record brought that column.
fn fill_blank_cells(table: &mut RenderedTable, header: &str, placeholder: &str) {
    let Some(column) = table.column_index(header) else {
        return;
    };
    for row in &mut table.rows {
        if let Some(cell) = row.cells.get_mut(column)
            && cell.is_empty()
        {
            *cell = placeholder.to_string();
        }
    }
}

fn describe_pod(path: &str, pod: &PodRef, body: Value) -> Result<PodDescription, FetchError> {
    let Value::Object(filtered) = normalize(&body) else {
        return Err(FetchError::envelope(path, "pod description is not an object"));
    };

    let metadata = section(&filtered, path, "metadata")?;
    let spec = section(&filtered, path, "spec")?;
    let status = section(&filtered, path, "status")?;

    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&pod.name)
        .to_string();

    let mut sections = vec![
        ("Metadata".to_string(), build_key_value_table(metadata)),
        ("Spec".to_string(), build_key_value_table(spec)),
        ("Status".to_string(), build_key_value_table(status)),
    ];
    for (title, owner, key) in [
        ("Containers", spec, "containers"),
        ("Volumes", spec, "volumes"),
        ("Conditions", status, "conditions"),
    ] {
        let records = owner
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if records.is_empty() {
            continue;
        }
        sections.push((title.to_string(), build_record_table(&records)?));
    }

    Ok(PodDescription { name, sections })
}

fn section<'a>(
    record: &'a ResourceRecord,
    path: &str,
    key: &str,
) -> Result<&'a ResourceRecord, FetchError> {
    record
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::envelope(path, format!("missing {key}")))
}

/// Flattens a node to name, cpu, memory (MiB) and a one-line OS summary.
fn node_summary(node: &ResourceRecord) -> ResourceRecord {
    let capacity = node.get("capacity").and_then(Value::as_object);
    let info = node.get("node_info").and_then(Value::as_object);
    let text = |record: Option<&ResourceRecord>, key: &str| {
        record
            .and_then(|record| record.get(key))
            .map(crate::table::compact_text)
            .unwrap_or_default()
    };

    let mut summary = ResourceRecord::new();
    if let Some(name) = node.get("name") {
        summary.insert("name".to_string(), name.clone());
    }
    summary.insert("cpu".to_string(), Value::String(text(capacity, "cpu")));
    let memory = text(capacity, "memory");
    summary.insert(
        "memory".to_string(),
        Value::String(
            parse_memory_bytes(&memory)
                .map(|bytes| format!("{:.2} MiB", bytes as f64 / MIB))
                .unwrap_or(memory),
        ),
    );
    summary.insert(
        "node_info".to_string(),
        Value::String(format!(
            "OS: {}, Kernel: {}",
            text(info, "os_image"),
            text(info, "kernel_version")
        )),
    );
    summary
}

fn parse_memory_bytes(value: &str) -> Option<u64> {
    const UNITS: [(&str, f64); 13] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
        ("E", 1_000_000_000_000_000_000.0),
        ("P", 1_000_000_000_000_000.0),
        ("T", 1_000_000_000_000.0),
        ("G", 1_000_000_000.0),
        ("M", 1_000_000.0),
        ("K", 1_000.0),
        ("k", 1_000.0),
    ];

    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| raw.strip_suffix(suffix).map(|n| (n, *multiplier)))
        .unwrap_or((raw, 1.0));
    let bytes = (number.parse::<f64>().ok()? * multiplier).round();
    if !bytes.is_finite() || bytes < 0.0 {
        return None;
    }
    Some(bytes as u64)
}
