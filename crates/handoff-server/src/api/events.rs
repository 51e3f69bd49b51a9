//! Server-sent launcher status events.

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{future, stream, Stream, StreamExt};
use handoff_core::{HandoffStatus, StatusReport, LAUNCHER_SESSION_TTL};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::helpers::ChallengeQuery;
use crate::error::ApiError;
use crate::state::AppState;

pub const STATUS_EVENT: &str = "status";

/// Stream status changes of a launcher session
///
/// The current status is sent first. The stream ends after the first terminal
/// status or once a session could no longer be alive.
pub async fn launcher_events(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let challenge = query.challenge()?;

    // subscribe before reading so no change between the two is lost
    let receiver = state.events.subscribe(challenge).await;
    let current = state.controller.check(challenge, &name).await?;

    let updates = BroadcastStream::new(receiver)
        .filter_map(|received| future::ready(received.ok()))
        .boxed();

    let stream = stream::unfold(Some((Some(current), updates)), |pending| async move {
        let (first, mut updates) = pending?;
        let report = match first {
            Some(report) => report,
            None => updates.next().await?,
        };
        let next = (report.status == HandoffStatus::InProgress).then_some((None, updates));
        Some((report, next))
    })
    .take_until(tokio::time::sleep(LAUNCHER_SESSION_TTL))
    .map(|report| Ok(status_event(&report)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn status_event(report: &StatusReport) -> Event {
    let data = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(STATUS_EVENT).data(data)
}
