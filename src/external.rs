use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::ExternalSourceError;
use crate::types::{Category, InteractionRecord, Sentiment};

const MESSAGE_FIELDS: [&str; 3] = ["message", "text", "content"];
const CATEGORY_FIELDS: [&str; 2] = ["category", "type"];
const SENTIMENT_FIELDS: [&str; 1] = ["sentiment"];
const TIMESTAMP_FIELDS: [&str; 2] = ["timestamp", "createdAt"];
const DEFAULT_MESSAGE: &str = "Interaction Botpress";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalTable {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub records: Vec<Value>,
}

/// Document served by the widget data endpoint. `files` is carried but not analysed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalPayload {
    #[serde(default)]
    pub tables: Vec<ExternalTable>,
    #[serde(default)]
    pub files: Vec<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait ExternalSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<InteractionRecord>, ExternalSourceError>;
}

pub struct HttpExternalSource {
    client: reqwest::Client,
    url: Option<String>,
    token: Option<String>,
}

impl HttpExternalSource {
    pub fn new(url: Option<String>, token: Option<String>, timeout: Duration) -> Result<Self, ExternalSourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl ExternalSource for HttpExternalSource {
    async fn fetch(&self) -> Result<Vec<InteractionRecord>, ExternalSourceError> {
        let url = self.url.as_deref().ok_or(ExternalSourceError::NotConfigured)?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Some(error) = serde_json::from_str::<ExternalPayload>(&body)
                .ok()
                .and_then(|payload| payload.error)
            {
                return Err(ExternalSourceError::Remote(error));
            }
            return Err(ExternalSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ExternalPayload = response.json().await?;
        if let Some(error) = payload.error.clone() {
            return Err(ExternalSourceError::Remote(error));
        }

        info!(
            tables = payload.tables.len(),
            files = payload.files.len(),
            "External widget data retrieved"
        );
        Ok(records_from_payload(&payload, Utc::now()))
    }
}

pub fn records_from_payload(payload: &ExternalPayload, now: DateTime<Utc>) -> Vec<InteractionRecord> {
    let empty = Map::new();
    payload
        .tables
        .iter()
        .flat_map(|table| {
            debug!(table_id = %table.id, table = %table.name, records = table.records.len(), "Mapping external table");
            table.records.iter()
        })
        .map(|raw| map_external_record(raw.as_object().unwrap_or(&empty), now))
        .collect()
}

/// Maps a free-form record, trying each candidate field in order:
///
/// * message: `message`, `text`, `content`, else a fixed placeholder
/// * category: `category`, `type`, else `general`; unknown keys are also `general`
/// * sentiment: `sentiment`, else `neutral`
/// * timestamp: `timestamp`, `createdAt` (RFC 3339 or epoch milliseconds), else `now`
///
/// Blank strings count as missing.
pub fn map_external_record(raw: &Map<String, Value>, now: DateTime<Utc>) -> InteractionRecord {
    let user_message = first_text(raw, &MESSAGE_FIELDS).unwrap_or(DEFAULT_MESSAGE).to_string();
    let category = first_text(raw, &CATEGORY_FIELDS)
        .map(Category::from_key)
        .unwrap_or(Category::General);
    let sentiment = first_text(raw, &SENTIMENT_FIELDS)
        .map(Sentiment::from_key)
        .unwrap_or(Sentiment::Neutral);
    let timestamp = TIMESTAMP_FIELDS
        .iter()
        .find_map(|field| raw.get(*field).and_then(parse_timestamp))
        .unwrap_or(now);

    InteractionRecord {
        user_message,
        category,
        sentiment,
        timestamp,
    }
}

fn first_text<'a>(raw: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| raw.get(*field).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}
