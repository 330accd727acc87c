//! Catalog platform client
//!
//! The platform exposes its entities over a generic REST surface:
//! - `GET  /entities/Track?fingerprint_id=…&limit=1`
//! - `GET  /entities/Track?limit=N`
//! - `PUT  /entities/Track/{id}` with `{fingerprint_id}`
//! - `GET  /entities/User/{id}` returning `{email, …}`
//!
//! List endpoints answer either a bare JSON array or an object wrapping the
//! array under `items`/`data`; both are accepted.

use crate::config::CatalogConfig;
use crate::models::CatalogEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "SPYNNERS-Recognition/0.1.0";
const API_KEY_HEADER: &str = "api_key";

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Catalog returned HTTP {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Could not build catalog client: {0}")]
    Client(String),
}

/// Track catalog capability consumed by the matcher and orchestrator
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Entry whose cached fingerprint id equals `fingerprint_id`, if any
    async fn find_by_fingerprint_id(
        &self,
        fingerprint_id: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Up to `limit` entries, in whatever order the catalog returns them
    async fn list_tracks(&self, limit: usize) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Cache a fingerprint id on an entry (single-field patch, idempotent)
    async fn set_fingerprint_id(
        &self,
        catalog_id: &str,
        fingerprint_id: &str,
    ) -> Result<(), CatalogError>;

    /// Producer contact email; `None` when the user is unknown or has no email
    async fn producer_email(&self, producer_id: &str) -> Result<Option<String>, CatalogError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<CatalogEntry>),
    Items { items: Vec<CatalogEntry> },
    Data { data: Vec<CatalogEntry> },
}

impl ListBody {
    fn into_entries(self) -> Vec<CatalogEntry> {
        match self {
            ListBody::Bare(entries) => entries,
            ListBody::Items { items } => items,
            ListBody::Data { data } => data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserBody {
    #[serde(default)]
    email: Option<String>,
}

/// HTTP implementation of [`CatalogService`]
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/entities/{entity}/{id}` with the id escaped as a single path segment
    fn entity_url(&self, entity: &str, id: &str) -> Result<reqwest::Url, CatalogError> {
        let mut url = reqwest::Url::parse(&self.url(&format!("/entities/{}", entity)))
            .map_err(|e| CatalogError::Client(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::Client("catalog base URL cannot hold a path".to_string()))?
            .push(id);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn fetch_tracks(&self, query: &[(&str, String)]) -> Result<Vec<CatalogEntry>, CatalogError> {
        let response = self
            .authorize(self.http_client.get(self.url("/entities/Track")).query(query))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Http(status.as_u16()));
        }

        let body: ListBody = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;
        Ok(body.into_entries())
    }
}

fn transport_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::Timeout
    } else if e.is_connect() {
        CatalogError::Network("connection failed".to_string())
    } else {
        CatalogError::Network("request failed".to_string())
    }
}

#[async_trait]
impl CatalogService for CatalogClient {
    async fn find_by_fingerprint_id(
        &self,
        fingerprint_id: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        let entries = self
            .fetch_tracks(&[
                ("fingerprint_id", fingerprint_id.to_string()),
                ("limit", "1".to_string()),
            ])
            .await?;
        Ok(entries.into_iter().next())
    }

    async fn list_tracks(&self, limit: usize) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut entries = self.fetch_tracks(&[("limit", limit.to_string())]).await?;
        entries.truncate(limit);
        tracing::debug!(count = entries.len(), "Fetched catalog tracks");
        Ok(entries)
    }

    async fn set_fingerprint_id(
        &self,
        catalog_id: &str,
        fingerprint_id: &str,
    ) -> Result<(), CatalogError> {
        let response = self
            .authorize(
                self.http_client
                    .put(self.entity_url("Track", catalog_id)?)
                    .json(&json!({ "fingerprint_id": fingerprint_id })),
            )
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Http(status.as_u16()));
        }
        Ok(())
    }

    async fn producer_email(&self, producer_id: &str) -> Result<Option<String>, CatalogError> {
        let response = self
            .authorize(
                self.http_client.get(self.entity_url("User", producer_id)?),
            )
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CatalogError::Http(status.as_u16()));
        }

        let body: UserBody = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;
        Ok(body.email.filter(|e| !e.trim().is_empty()))
    }
}
