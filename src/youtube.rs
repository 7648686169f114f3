use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Thin client for the YouTube Data API v3 search endpoint.
#[derive(Debug)]
pub struct YouTube {
    api_key: String,
    api_base: String,
    client: Client,
}

#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("search quota exhausted or rate limited")]
    Quota,
    #[error("youtube api returned status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<Value>,
}

impl YouTube {
    pub fn new(api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            api_key,
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            client,
        })
    }

    /// Issues one search call with the fixed movie-oriented filters.
    /// Returns the raw response items; 403 and 429 map to `Quota`.
    pub async fn search(&self, query: &str) -> Result<Vec<Value>, YouTubeError> {
        let response = self
            .client
            .get(format!("{}/search", self.api_base))
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("part", "snippet"),
                ("type", "video"),
                ("videoDuration", "long"),
                ("videoDefinition", "high"),
                ("maxResults", "25"),
                ("relevanceLanguage", "en"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(YouTubeError::Quota);
        }
        if !status.is_success() {
            return Err(YouTubeError::Status(status));
        }

        let data: SearchListResponse = response.json().await?;
        Ok(data.items)
    }
}
