//! HTTP client for the note API
//!
//! Used by `notectl` and by the server tests.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::api::{
    ErrorResponse, HealthResponse, ListNotesResponse, ReadNoteRequest, ReadNoteResponse,
    WriteNoteRequest, WriteNoteResponse,
};
use crate::error::{Error, Result};

/// Client for a running Storj Worker
pub struct NoteClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl NoteClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:5000`)
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let mut base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            base_url = format!("http://{}", base_url);
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.http.get(self.url("/health")).send().await?;
        decode(response).await
    }

    /// GET /listNotes
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut request = self.http.get(self.url("/listNotes"));
        if let Some(prefix) = prefix {
            request = request.query(&[("prefix", prefix)]);
        }
        let response = self.authorized(request).send().await?;
        let listing: ListNotesResponse = decode(response).await?;
        Ok(listing.files)
    }

    /// POST /readNote
    pub async fn read(&self, filename: &str) -> Result<String> {
        let body = ReadNoteRequest {
            filename: Some(filename.to_string()),
        };
        let request = self.http.post(self.url("/readNote")).json(&body);
        let response = self.authorized(request).send().await?;
        let note: ReadNoteResponse = decode(response).await?;
        Ok(note.content)
    }

    /// POST /writeNote, returning the server's confirmation message
    pub async fn write(&self, filename: &str, content: &str) -> Result<String> {
        let body = WriteNoteRequest {
            filename: Some(filename.to_string()),
            content: Some(content.to_string()),
        };
        let request = self.http.post(self.url("/writeNote")).json(&body);
        let response = self.authorized(request).send().await?;
        let result: WriteNoteResponse = decode(response).await?;
        Ok(result.message)
    }
}

/// Decode a JSON body, turning non-2xx answers into `Error::Api`
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await?;
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.error)
            .unwrap_or(text);
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}
