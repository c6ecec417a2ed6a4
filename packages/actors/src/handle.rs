//! Cloneable handle to the running coordinator.

use pigmap_core::{Comment, DomainEvent, Report, ReportId};
use ractor::{ActorRef, RpcReplyPort};

use crate::cache::CacheSnapshot;
use crate::connection::{ConnectionId, LiveSink};
use crate::messages::{CoordinatorError, CoordinatorMessage, PublishReport, Subscription};

/// Handle given to the gateway. Every method is one mailbox round trip.
#[derive(Clone)]
pub struct Coordinator {
    actor: ActorRef<CoordinatorMessage>,
}

impl Coordinator {
    pub fn new(actor: ActorRef<CoordinatorMessage>) -> Self {
        Self { actor }
    }

    /// Find a coordinator spawned under `name`.
    pub fn lookup(name: &str) -> Option<Self> {
        ractor::registry::where_is(name.to_string()).map(|cell| Self::new(cell.into()))
    }

    async fn call<T>(
        &self,
        message: impl FnOnce(RpcReplyPort<T>) -> CoordinatorMessage,
    ) -> Result<T, CoordinatorError>
    where
        T: Send + 'static,
    {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(message(tx.into()))
            .map_err(|_| CoordinatorError::Unavailable)?;
        rx.await.map_err(|_| CoordinatorError::Unavailable)
    }

    pub async fn subscribe(
        &self,
        sink: impl LiveSink,
    ) -> Result<Subscription, CoordinatorError> {
        let sink: Box<dyn LiveSink> = Box::new(sink);
        self.call(|reply| CoordinatorMessage::Subscribe { sink, reply })
            .await
    }

    pub async fn publish(&self, event: DomainEvent) -> Result<PublishReport, CoordinatorError> {
        let event = Box::new(event);
        self.call(|reply| CoordinatorMessage::Publish { event, reply })
            .await?
    }

    /// Fire-and-forget. Safe to call more than once.
    pub fn unsubscribe(&self, id: ConnectionId) {
        if self
            .actor
            .send_message(CoordinatorMessage::Unsubscribe { id })
            .is_err()
        {
            tracing::debug!("Coordinator gone, dropping unsubscribe for {}", id);
        }
    }

    pub async fn recent_reports(&self) -> Result<Vec<Report>, CoordinatorError> {
        self.call(|reply| CoordinatorMessage::RecentReports { reply })
            .await
    }

    pub async fn comments_for(&self, report_id: ReportId) -> Result<Vec<Comment>, CoordinatorError> {
        self.call(|reply| CoordinatorMessage::Comments { report_id, reply })
            .await
    }

    pub async fn connection_count(&self) -> Result<usize, CoordinatorError> {
        self.call(|reply| CoordinatorMessage::ConnectionCount { reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<CacheSnapshot, CoordinatorError> {
        self.call(|reply| CoordinatorMessage::Snapshot { reply })
            .await
    }

    /// Persist a final snapshot, close every connection and stop the actor.
    ///
    /// Await the join handle from `start_coordinator` afterwards.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        self.call(|reply| CoordinatorMessage::Shutdown { reply })
            .await?
    }
}
