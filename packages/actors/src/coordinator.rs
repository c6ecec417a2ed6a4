//! The live coordinator: one actor that owns the report cache and every
//! live connection.
//!
//! All cache writes and all fan-out go through this actor's mailbox, so
//! publishes are totally ordered and every subscriber sees them in the same
//! order. A connection whose send fails or outlives the send timeout is
//! dropped on the spot; there are no retries.

use std::sync::Arc;
use std::time::Duration;

use pigmap_core::{DomainEvent, LiveMessage};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::Deserialize;

use crate::cache::{CacheLimits, CacheSnapshot, LiveCache};
use crate::connection::{ConnectionId, ConnectionRegistry, DEFAULT_SEND_TIMEOUT, LiveSink};
use crate::handle::Coordinator;
use crate::messages::{CoordinatorError, CoordinatorMessage, PublishReport, Subscription};
use crate::persistence::{PersistenceError, SnapshotBackend, SnapshotStore};

/// Registry name used when none is configured.
pub const DEFAULT_COORDINATOR_NAME: &str = "global-reports";

/// Settings for the live coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Actor registry name. `None` spawns an anonymous actor.
    pub name: Option<String>,
    /// Key of the snapshot blob in the snapshot store.
    pub snapshot_key: String,
    pub cache: CacheLimits,
    pub snapshot: SnapshotBackend,
    /// Per-connection send timeout in milliseconds.
    pub send_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: Some(DEFAULT_COORDINATOR_NAME.to_string()),
            snapshot_key: "live-cache".to_string(),
            cache: CacheLimits::default(),
            snapshot: SnapshotBackend::default(),
            send_timeout_ms: DEFAULT_SEND_TIMEOUT.as_millis() as u64,
        }
    }
}

impl CoordinatorConfig {
    /// Anonymous coordinator with an in-memory snapshot. For tests.
    pub fn ephemeral() -> Self {
        Self {
            name: None,
            snapshot: SnapshotBackend::Memory,
            ..Self::default()
        }
    }
}

/// Arguments for spawning the coordinator.
pub struct CoordinatorArgs {
    pub store: Arc<dyn SnapshotStore>,
    pub snapshot_key: String,
    pub limits: CacheLimits,
    pub send_timeout: Duration,
}

/// State for the coordinator actor.
pub struct CoordinatorState {
    cache: LiveCache,
    connections: ConnectionRegistry,
    store: Arc<dyn SnapshotStore>,
    snapshot_key: String,
}

impl CoordinatorState {
    async fn load(args: CoordinatorArgs) -> Result<Self, PersistenceError> {
        let cache = match args.store.get(&args.snapshot_key).await {
            Ok(Some(value)) => match serde_json::from_value::<CacheSnapshot>(value) {
                Ok(snapshot) => LiveCache::from_snapshot(snapshot, args.limits),
                Err(e) => {
                    tracing::warn!("Ignoring malformed snapshot {:?}: {}", args.snapshot_key, e);
                    LiveCache::new(args.limits)
                }
            },
            Ok(None) => LiveCache::new(args.limits),
            Err(e) if e.is_malformed() => {
                tracing::warn!("Ignoring unreadable snapshot {:?}: {}", args.snapshot_key, e);
                LiveCache::new(args.limits)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            cache,
            connections: ConnectionRegistry::with_send_timeout(args.send_timeout),
            store: args.store,
            snapshot_key: args.snapshot_key,
        })
    }

    /// Write the whole cache as one blob.
    async fn persist(&self) -> Result<(), PersistenceError> {
        let value = serde_json::to_value(self.cache.snapshot())?;
        self.store.put(&self.snapshot_key, value).await
    }

    async fn subscribe(&mut self, sink: Box<dyn LiveSink>) -> Subscription {
        let id = ConnectionId::new();
        self.connections.register(id, sink);
        tracing::debug!("Connection {} subscribed ({} open)", id, self.connections.len());

        if self.cache.is_empty() {
            return Subscription {
                id,
                snapshot_sent: false,
            };
        }

        let snapshot = self.cache.snapshot();
        let initial = LiveMessage::Initial {
            reports: snapshot.reports,
            comments: snapshot.comments,
        };
        let snapshot_sent = match initial.to_frame() {
            Ok(frame) => self.connections.send_to(&id, &frame).await.is_ok(),
            Err(e) => {
                tracing::warn!("Failed to encode initial snapshot: {}", e);
                false
            }
        };

        Subscription { id, snapshot_sent }
    }

    async fn publish(&mut self, event: DomainEvent) -> Result<PublishReport, CoordinatorError> {
        event.validate()?;
        let frame = event.to_live_message().to_frame()?;

        let change = self.cache.apply(&event);
        let persisted = self.persist().await;
        let outcome = self.connections.broadcast(&frame).await;

        tracing::debug!(
            "Published {} for {}: {:?}, delivered to {}, dropped {}",
            event.kind(),
            event.report_id(),
            change,
            outcome.delivered,
            outcome.dropped.len()
        );

        let report = PublishReport {
            kind: event.kind(),
            change,
            delivered: outcome.delivered,
            dropped: outcome.dropped,
        };

        match persisted {
            Ok(()) => Ok(report),
            Err(source) => {
                tracing::warn!("Snapshot write failed after {}: {}", event.kind(), source);
                Err(CoordinatorError::Unpersisted {
                    report: Box::new(report),
                    source,
                })
            }
        }
    }
}

/// Actor that serializes cache mutation and fan-out.
pub struct LiveCoordinator;

impl Actor for LiveCoordinator {
    type Msg = CoordinatorMessage;
    type State = CoordinatorState;
    type Arguments = CoordinatorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let state = CoordinatorState::load(args).await?;
        tracing::info!(
            "Starting live coordinator with {} cached reports",
            state.cache.len()
        );
        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CoordinatorMessage::Subscribe { sink, reply } => {
                let subscription = state.subscribe(sink).await;
                let _ = reply.send(subscription);
            }

            CoordinatorMessage::Publish { event, reply } => {
                let result = state.publish(*event).await;
                let _ = reply.send(result);
            }

            CoordinatorMessage::Unsubscribe { id } => {
                if state.connections.remove(&id) {
                    tracing::debug!(
                        "Connection {} unsubscribed ({} open)",
                        id,
                        state.connections.len()
                    );
                }
            }

            CoordinatorMessage::RecentReports { reply } => {
                let _ = reply.send(state.cache.reports().cloned().collect());
            }

            CoordinatorMessage::Comments { report_id, reply } => {
                let _ = reply.send(state.cache.comments_for(&report_id));
            }

            CoordinatorMessage::ConnectionCount { reply } => {
                let _ = reply.send(state.connections.len());
            }

            CoordinatorMessage::Snapshot { reply } => {
                let _ = reply.send(state.cache.snapshot());
            }

            CoordinatorMessage::Shutdown { reply } => {
                tracing::info!(
                    "Shutting down live coordinator ({} open connections)",
                    state.connections.len()
                );
                let persisted = state.persist().await.map_err(CoordinatorError::from);
                state.connections.close_all().await;
                let _ = reply.send(persisted);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            "Live coordinator stopped with {} cached reports",
            state.cache.len()
        );
        Ok(())
    }
}

/// Spawn the coordinator over an already opened snapshot store.
pub async fn start_coordinator(
    config: &CoordinatorConfig,
    store: Arc<dyn SnapshotStore>,
) -> Result<(Coordinator, tokio::task::JoinHandle<()>), CoordinatorError> {
    let args = CoordinatorArgs {
        store,
        snapshot_key: config.snapshot_key.clone(),
        limits: config.cache,
        send_timeout: Duration::from_millis(config.send_timeout_ms),
    };

    let (actor, handle) = Actor::spawn(config.name.clone(), LiveCoordinator, args)
        .await
        .map_err(|e| CoordinatorError::Spawn(e.to_string()))?;

    Ok((Coordinator::new(actor), handle))
}
