use crate::sse::models::StreamEvent;
use crate::startup::AppState;
use crate::stats::StatsStore;
use axum::{
    extract::Extension,
    response::sse::{Event, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

/// One live viewer of the stats stream.
///
/// The viewer first gets the current snapshot (or a degraded event if it
/// cannot be loaded), then every snapshot the store publishes, interleaved
/// with a heartbeat every `heartbeat` of wall time. Dropping the stream ends
/// the session: the timer stops and the store registration is released.
pub struct BroadcastSession {
    store: StatsStore,
    heartbeat: Duration,
}

impl BroadcastSession {
    pub fn new(store: StatsStore, heartbeat: Duration) -> Self {
        Self { store, heartbeat }
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> {
        let Self { store, heartbeat } = self;
        // registered before the snapshot so nothing published in between is lost
        let mut subscription = store.subscribe();
        let closed = SessionClosed;

        async_stream::stream! {
            let _closed = closed;
            match store.snapshot_with_revision().await {
                Ok((stats, revision)) => {
                    // anything queued up to this revision is already in the snapshot
                    subscription.skip_through(revision);
                    yield StreamEvent::Stats(stats);
                }
                Err(e) => {
                    warn!(error = %e, "initial stats load failed, sending degraded event");
                    yield StreamEvent::degraded();
                }
            }

            let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let event = tokio::select! {
                    next = subscription.recv() => next.map(StreamEvent::Stats),
                    _ = ticker.tick() => Some(StreamEvent::heartbeat()),
                };
                match event {
                    Some(event) => yield event,
                    None => break,
                }
            }
        }
    }
}

struct SessionClosed;

impl Drop for SessionClosed {
    fn drop(&mut self) {
        debug!("live stats session closed");
    }
}

pub async fn stats_stream(
    Extension(app_state): Extension<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!("live stats session opened");
    let session = BroadcastSession::new(app_state.store.clone(), app_state.heartbeat);
    let stream = session
        .into_stream()
        .map(|event| Event::default().json_data(event));

    Sse::new(stream)
}
