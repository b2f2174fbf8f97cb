//! Dropbox folder listing, the remote side of the upload status report.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const DROPBOX_API_BASE_URL: &str = "https://api.dropboxapi.com/2";

#[derive(Debug, Error)]
pub enum DropboxError {
    #[error("Dropbox request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Dropbox returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[async_trait]
pub trait FolderListing: Send + Sync {
    /// Names of every entry directly under `folder`, across all result pages.
    async fn list_names(&self, folder: &str) -> Result<Vec<String>, DropboxError>;
}

#[derive(Deserialize)]
struct ListFolderPage {
    #[serde(default)]
    entries: Vec<FolderEntry>,
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct FolderEntry {
    name: String,
}

#[derive(Clone, Debug)]
pub struct DropboxClient {
    http: reqwest::Client,
    access_token: SecretString,
    base_url: String,
}

impl DropboxClient {
    pub fn new(access_token: SecretString, timeout: Duration) -> Result<Self, DropboxError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, access_token, base_url: DROPBOX_API_BASE_URL.to_owned() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn call(&self, route: &str, body: serde_json::Value) -> Result<ListFolderPage, DropboxError> {
        let response = self
            .http
            .post(format!("{}/{route}", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DropboxError::Api { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl FolderListing for DropboxClient {
    async fn list_names(&self, folder: &str) -> Result<Vec<String>, DropboxError> {
        let mut page = self.call("files/list_folder", json!({ "path": folder })).await?;
        let mut names: Vec<String> = page.entries.drain(..).map(|entry| entry.name).collect();

        while page.has_more {
            page = self.call("files/list_folder/continue", json!({ "cursor": page.cursor })).await?;
            debug!(folder, page_size = page.entries.len(), "fetched dropbox continuation page");
            names.extend(page.entries.drain(..).map(|entry| entry.name));
        }

        Ok(names)
    }
}
