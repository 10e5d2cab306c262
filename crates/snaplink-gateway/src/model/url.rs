use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use snaplink_core::UrlRecord;

#[derive(Debug, Deserialize)]
pub struct CreateUrlRequest {
    pub source_url: String,
}

/// Public view of a stored record, returned by creation and stats.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlResponse {
    pub source_url: String,
    pub short_id: String,
    pub full_url: String,
    pub visits: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UrlResponse {
    pub fn from_record(record: UrlRecord, base_url: &str) -> Self {
        Self {
            full_url: record.short_id.to_url(base_url),
            short_id: record.short_id.into(),
            source_url: record.source_url,
            visits: record.visits,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
