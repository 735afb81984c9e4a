use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    catalog::{EventDetail, EventFilter, EventQuery},
    error::{AppError, AppResult},
    flash::{FlashQuery, Message},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_events))
        .route("/{event_id}/", get(event_details))
}

fn cached_json(body: String, cache_status: &'static str) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json"), (header::HeaderName::from_static("x-cache"), cache_status)],
        body,
    )
        .into_response()
}

/// GET / - event listing
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventQuery>,
) -> AppResult<Response> {
    let filter = EventFilter::from_query(&params);
    let cache_key = filter.cache_key();

    let generation = match state.cache.listing_generation().await {
        Ok(generation) => Some(generation),
        Err(e) => {
            tracing::warn!("event cache generation read failed: {:?}", e);
            None
        }
    };

    if let Some(generation) = generation {
        match state.cache.cached_event_listing(generation, &cache_key).await {
            Ok(Some(cached)) => return Ok(cached_json(cached, "HIT")),
            Ok(None) => {}
            Err(e) => tracing::warn!("event cache read failed: {:?}", e),
        }
    }

    let page = state.catalog.list_events(&filter).await?;
    let body = serde_json::to_string(&page).map_err(|e| AppError::Internal(e.to_string()))?;

    if let Some(generation) = generation {
        let ttl = state.config.app.event_list_cache_ttl_seconds;
        if let Err(e) = state.cache.cache_event_listing(generation, &cache_key, &body, ttl).await {
            tracing::warn!("event cache write failed: {:?}", e);
        }
    }

    Ok(cached_json(body, "MISS"))
}

#[derive(Serialize)]
pub struct EventDetailsPage {
    #[serde(flatten)]
    pub detail: EventDetail,
    pub messages: Vec<Message>,
}

/// GET /{event_id}/ - event with its seat map
pub async fn event_details(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(flash): Query<FlashQuery>,
) -> AppResult<Json<EventDetailsPage>> {
    let detail = state
        .catalog
        .event_detail(event_id)
        .await?
        .ok_or(AppError::NotFound("Event"))?;

    Ok(Json(EventDetailsPage {
        detail,
        messages: flash.messages(),
    }))
}
