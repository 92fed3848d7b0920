use jiff::Timestamp;
use keyhole_core::UrlRecord;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Body of `POST /v1/urls`. Everything but `original_url` overrides the
/// server defaults for this call only.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUrlRequest {
    pub original_url: Option<String>,
    pub namespace: Option<String>,
    pub host: Option<String>,
    pub protocol: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUrlResponse {
    /// The short URL, the original URL if it could not be shortened, or
    /// `null` when no URL was sent.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlResponse {
    pub key: String,
    pub original_url: String,
    pub created_at: Timestamp,
}

impl From<UrlRecord> for UrlResponse {
    fn from(record: UrlRecord) -> Self {
        Self {
            key: record.key.to_string(),
            original_url: record.original_url,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
