use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};

use super::query::SearchRequest;
use crate::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSource {
    Server,
    /// Built from the rows already loaded.
    Client,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub source: ExportSource,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("could not serialize rows: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Server export endpoint taking the same body as the search.
#[async_trait]
pub trait ExportBackend: Send + Sync {
    fn report_name(&self) -> &str;

    async fn export(&self, request: &SearchRequest, format: ExportFormat) -> Result<Vec<u8>, ApiError>;
}

/// Asks the server for the file; when the endpoint is missing or unreachable
/// falls back to CSV or JSON built from `rows`. JSON is always built locally.
pub async fn export_report<R: Serialize>(
    backend: &dyn ExportBackend,
    request: &SearchRequest,
    format: ExportFormat,
    rows: &[R],
) -> Result<ExportFile, ExportError> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let name = backend.report_name();

    if format != ExportFormat::Json {
        match backend.export(request, format).await {
            Ok(bytes) => {
                info!(report = name, %format, bytes = bytes.len(), "server export received");
                return Ok(ExportFile {
                    file_name: format!("{name}-{stamp}.{}", format.extension()),
                    format,
                    source: ExportSource::Server,
                    bytes,
                });
            }
            Err(err) if err.is_unavailable() => {
                warn!(report = name, error = %err, "export endpoint unavailable, building file locally");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let (format, bytes) = match format {
        ExportFormat::Json => (ExportFormat::Json, rows_to_json(rows)?),
        ExportFormat::Csv | ExportFormat::Xlsx => (ExportFormat::Csv, rows_to_csv(rows)?),
    };
    Ok(ExportFile {
        file_name: format!("{name}-{stamp}.{}", format.extension()),
        format,
        source: ExportSource::Client,
        bytes,
    })
}

pub fn rows_to_json<R: Serialize>(rows: &[R]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(rows)
}

/// Header is the union of the rows' top-level keys in first-seen order.
/// Nested values are written as compact JSON.
pub fn rows_to_csv<R: Serialize>(rows: &[R]) -> Result<Vec<u8>, serde_json::Error> {
    let objects: Vec<Map<String, Value>> = rows
        .iter()
        .map(|row| {
            serde_json::to_value(row).map(|value| match value {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            })
        })
        .collect::<Result<_, _>>()?;

    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut out = String::new();
    push_record(&mut out, columns.iter().map(String::as_str));
    for object in &objects {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| cell(object.get(column)))
            .collect();
        push_record(&mut out, cells.iter().map(String::as_str));
    }
    Ok(out.into_bytes())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}
