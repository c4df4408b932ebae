//! Employee record lookup used to prefill card fields.
//!
//! `AirtableSearch` queries an Airtable table by name; `SearchDebouncer`
//! turns keystroke-rate queries into at most one lookup per quiet period.

use crate::{Error, Result};
use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet period between the last keystroke and the lookup
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Photo", default)]
    pub photo: Vec<Attachment>,
}

/// One candidate record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: String,
    #[serde(default)]
    pub fields: RecordFields,
}

impl SearchRecord {
    /// First photo URL, if the record has one
    pub fn photo_url(&self) -> Option<&str> {
        self.fields.photo.first().map(|a| a.url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub records: Vec<SearchRecord>,
}

/// Free-text record lookup
#[async_trait]
pub trait RecordSearch: Send + Sync {
    /// Records whose name contains `query`. An empty query yields no records.
    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>>;
}

#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_url: String,
    pub base_id: String,
    pub table_id: String,
    pub token: String,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.airtable.com/v0".to_string(),
            base_id: String::new(),
            table_id: String::new(),
            token: String::new(),
        }
    }
}

impl AirtableConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_id.is_empty() && !self.table_id.is_empty() && !self.token.is_empty()
    }
}

/// Case-insensitive name match formula for `query`
pub fn name_filter(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('"', "\\\"");
    format!("SEARCH(LOWER(\"{}\"), LOWER(Name))", escaped)
}

pub struct AirtableSearch {
    client: reqwest::Client,
    config: AirtableConfig,
}

impl AirtableSearch {
    pub fn new(config: AirtableConfig) -> Result<Self> {
        url::Url::parse(&config.api_url)
            .map_err(|e| Error::ConfigError(format!("Invalid Airtable API URL '{}': {}", config.api_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.base_id,
            self.config.table_id
        )
    }

    async fn fetch(&self, query: &str) -> std::result::Result<SearchResponse, reqwest::Error> {
        self.client
            .get(self.endpoint())
            .bearer_auth(&self.config.token)
            .query(&[("filterByFormula", name_filter(query))])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await
    }
}

#[async_trait]
impl RecordSearch for AirtableSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        match self.fetch(query).await {
            Ok(resp) => {
                debug!("Search '{}' matched {} records", query, resp.records.len());
                Ok(resp.records)
            }
            Err(e) => {
                error!("Airtable search for '{}' failed: {}", query, e);
                Err(Error::SearchFailed)
            }
        }
    }
}

/// Result of one debounced lookup
#[derive(Debug)]
pub struct SearchOutcome {
    pub query: String,
    pub result: Result<Vec<SearchRecord>>,
}

/// Search-as-you-type scheduler.
///
/// Each `schedule` cancels the pending lookup before scheduling its own, so
/// only the last query of a burst reaches the backend.
pub struct SearchDebouncer {
    search: Arc<dyn RecordSearch>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<SearchOutcome>,
}

impl SearchDebouncer {
    pub fn new(search: Arc<dyn RecordSearch>) -> (Self, mpsc::UnboundedReceiver<SearchOutcome>) {
        Self::with_delay(search, DEFAULT_DEBOUNCE)
    }

    pub fn with_delay(
        search: Arc<dyn RecordSearch>,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SearchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                search,
                delay,
                pending: None,
                tx,
            },
            rx,
        )
    }

    /// Must be called within a tokio runtime.
    pub fn schedule(&mut self, query: impl Into<String>) {
        self.cancel();
        let query = query.into();
        let search = Arc::clone(&self.search);
        let delay = self.delay;
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = search.search(&query).await;
            let _ = tx.send(SearchOutcome { query, result });
        }));
    }

    /// Drop the pending lookup, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
