//! Message types for coordinator communication.

use pigmap_core::{Comment, CoreError, DomainEvent, Report, ReportId};
use ractor::RpcReplyPort;

use crate::cache::{CacheChange, CacheSnapshot};
use crate::connection::{ConnectionId, LiveSink};
use crate::persistence::PersistenceError;

/// Messages for the LiveCoordinator.
pub enum CoordinatorMessage {
    /// Register a live sink and send it the current cache.
    Subscribe {
        sink: Box<dyn LiveSink>,
        reply: RpcReplyPort<Subscription>,
    },

    /// Apply, persist and fan out a domain event.
    Publish {
        event: Box<DomainEvent>,
        reply: RpcReplyPort<Result<PublishReport, CoordinatorError>>,
    },

    /// Forget a connection. Unknown ids are ignored.
    Unsubscribe { id: ConnectionId },

    /// Cached reports, newest first.
    RecentReports { reply: RpcReplyPort<Vec<Report>> },

    /// Cached comments for one report, newest first.
    Comments {
        report_id: ReportId,
        reply: RpcReplyPort<Vec<Comment>>,
    },

    /// Number of open connections.
    ConnectionCount { reply: RpcReplyPort<usize> },

    /// Copy of the whole cache.
    Snapshot { reply: RpcReplyPort<CacheSnapshot> },

    /// Persist, close every connection and stop.
    Shutdown {
        reply: RpcReplyPort<Result<(), CoordinatorError>>,
    },
}

/// Returned by a successful subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub id: ConnectionId,
    /// Whether an `initial` message went out. False when the cache was empty
    /// or the send failed (in which case the connection is already gone).
    pub snapshot_sent: bool,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub kind: &'static str,
    pub change: CacheChange,
    pub delivered: usize,
    pub dropped: Vec<ConnectionId>,
}

/// Error type for coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] CoreError),

    /// The cache was updated and the event broadcast, but the snapshot write failed.
    #[error("Published without a snapshot: {source}")]
    Unpersisted {
        report: Box<PublishReport>,
        source: PersistenceError,
    },

    #[error("Snapshot persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Coordinator unavailable")]
    Unavailable,

    #[error("Failed to spawn coordinator: {0}")]
    Spawn(String),
}
