//! SSE endpoint for job progress.
//!
//! Clients reconnect with `?last_seen=<seq>`; the stream replays logged
//! events past the cursor, switches to live delivery, and closes after
//! the terminal event. Authentication/ownership of the user id in the
//! path is enforced by the session layer in front of this service.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::Stream;
use serde::Deserialize;
use uuid::Uuid;

use crate::kernel::progress::ProgressSubscription;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Replay cursor; events with seq <= last_seen are skipped
    #[serde(default)]
    pub last_seen: u64,
}

pub async fn stream_progress(
    State(state): State<AppState>,
    Path((user_id, job_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let subscription = state
        .deps
        .progress
        .subscribe(user_id, job_id, query.last_seen)
        .await;

    Sse::new(event_stream(subscription)).keep_alive(KeepAlive::default())
}

fn event_stream(
    subscription: ProgressSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next_event().await?;
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Some((
            Ok(Event::default().event("progress").data(data)),
            subscription,
        ))
    })
}
