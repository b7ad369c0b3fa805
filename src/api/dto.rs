//! Data Transfer Objects
//!
//! Request and response types for the API endpoints that are not wire
//! messages of the remote-read protocol.

use serde::{Deserialize, Serialize};

use crate::remote::FilterRequest;

/// Raw read parameters, from the query string (GET) or a form body (POST)
///
/// Limits arrive as text; anything that is not an integer reads as unlimited.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawParams {
    pub db: String,
    pub rp: String,
    pub measurement: String,
    pub field: String,
    #[serde(rename = "where")]
    pub where_clause: String,
    pub slimit: Option<String>,
    pub limit: Option<String>,
}

impl RawParams {
    pub fn into_filter(self) -> FilterRequest {
        FilterRequest {
            db: self.db,
            rp: self.rp,
            measurement: self.measurement,
            field: self.field,
            where_clause: self.where_clause,
            slimit: parse_limit(self.slimit.as_deref()),
            limit: parse_limit(self.limit.as_deref()),
        }
    }
}

fn parse_limit(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: healthy or unhealthy
    pub status: String,
    /// Storage status
    pub storage: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
