//! Events Routes
//!
//! - POST /api/v1/events - Validate an event and publish it to the queue
//! - GET /api/v1/events - Query stored events

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateEventResponse, EventsParams, GetEventsResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::event::EventPayload;
use crate::query::EventsQuery;

/// POST /api/v1/events
///
/// 201 once the event is on the queue; it is stored asynchronously.
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateEventResponse>)> {
    let Json(payload) = payload.map_err(|e| ApiError::Decode(e.body_text()))?;

    let event = state.producer.accept(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            status: StatusCode::CREATED.as_u16(),
            data: event.into(),
        }),
    ))
}

/// GET /api/v1/events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    params: Result<Query<EventsParams>, QueryRejection>,
) -> ApiResult<Json<GetEventsResponse>> {
    let Query(params) = params.map_err(|e| ApiError::Decode(e.body_text()))?;
    let query = EventsQuery::from(params);
    let events = state.engine.execute(&query).await?;

    Ok(Json(GetEventsResponse {
        status: StatusCode::OK.as_u16(),
        data: events,
    }))
}
