use crate::source::EventQuery;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sw_protocol::EventRecord;
use tracing::error;

/// Most recent window, newest first. Reads the store directly and leaves the
/// dispatcher's watermark alone. On failure the body is still an (empty)
/// event array so array-only clients keep parsing it.
pub async fn recent_events(State(state): State<AppState>) -> Response {
    match state
        .source
        .fetch(EventQuery::Latest {
            limit: state.bootstrap_window,
        })
        .await
    {
        Ok(events) => Json(events).into_response(),
        Err(e) => {
            error!(error = %e, "recent events query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Vec::<EventRecord>::new()),
            )
                .into_response()
        }
    }
}
