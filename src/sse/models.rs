use crate::stats::Stats;
use serde::Serialize;

/// Payload of one outbound event on the live stats stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Stats(Stats),
    /// Sent in place of the initial snapshot when it could not be loaded.
    Degraded {
        #[serde(flatten)]
        stats: Stats,
        error: bool,
    },
    Heartbeat {
        heartbeat: bool,
    },
}

impl StreamEvent {
    pub fn degraded() -> Self {
        StreamEvent::Degraded {
            stats: Stats::empty(),
            error: true,
        }
    }

    pub fn heartbeat() -> Self {
        StreamEvent::Heartbeat { heartbeat: true }
    }
}
