//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};

use crate::event::{EventPayload, StoredEvent};
use crate::query::EventsQuery;
use crate::queue::QueueStats;

// ============================================
// EVENTS DTOs
// ============================================

/// POST /api/v1/events response, echoes the accepted payload
#[derive(Debug, Serialize)]
pub struct CreateEventResponse {
    pub status: u16,
    pub data: EventPayload,
}

/// GET /api/v1/events response
#[derive(Debug, Serialize)]
pub struct GetEventsResponse {
    pub status: u16,
    pub data: Vec<StoredEvent>,
}

/// GET /api/v1/events query string
///
/// Every field is kept as raw text; integers that are absent or do not
/// parse count as 0.
#[derive(Debug, Default, Deserialize)]
pub struct EventsParams {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub interval: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

fn lenient_int(raw: &Option<String>) -> i64 {
    raw.as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

impl From<EventsParams> for EventsQuery {
    fn from(params: EventsParams) -> Self {
        EventsQuery::new()
            .range(lenient_int(&params.from), lenient_int(&params.to))
            .interval_hours(lenient_int(&params.interval))
            .limit(lenient_int(&params.limit))
            .offset(lenient_int(&params.offset))
            .event_type(params.event_type.unwrap_or_default())
    }
}

// ============================================
// ERROR / STATUS DTOs
// ============================================

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

/// GET / response
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub status: u16,
    /// Unix seconds
    pub timestamp: i64,
}

/// GET /health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", "degraded" or "unhealthy"
    pub status: String,
    pub queue: String,
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<QueueStats>,
    pub uptime_seconds: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> EventsParams {
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let uri: axum::http::Uri = format!("/?{}", query).parse().unwrap();
        axum::extract::Query::<EventsParams>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    #[test]
    fn test_params_to_query() {
        let query: EventsQuery = params(&[
            ("type", "login"),
            ("from", "100"),
            ("to", "200"),
            ("limit", "5"),
            ("offset", "2"),
        ])
        .into();

        assert_eq!(
            query,
            EventsQuery::new()
                .event_type("login")
                .range(100, 200)
                .limit(5)
                .offset(2)
        );
    }

    #[test]
    fn test_unparseable_integers_count_as_zero() {
        let query: EventsQuery =
            params(&[("from", "yesterday"), ("limit", "-"), ("interval", "1.5")]).into();
        assert_eq!(query, EventsQuery::new());
    }

    #[test]
    fn test_absent_params_are_defaults() {
        let query: EventsQuery = EventsParams::default().into();
        assert_eq!(query, EventsQuery::new());
        assert_eq!(query.effective_limit(), crate::query::DEFAULT_LIMIT);
    }
}
