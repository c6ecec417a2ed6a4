//! Live broadcast coordinator.
//!
//! This crate provides the Ractor-based actor that owns the recent-report
//! cache and every live subscriber connection.
//!
//! # Architecture
//!
//! - `LiveCoordinator` - The actor. Applies domain events to a bounded
//!   `LiveCache`, persists the cache through a `SnapshotStore` and fans out
//!   to the `ConnectionRegistry`
//! - `Coordinator` - Cloneable handle the gateway calls into
//! - `LiveSink` - Write side of one subscriber (WebSocket, channel, ...)
//!
//! # Usage
//!
//! ```ignore
//! use actors::{ChannelSink, CoordinatorConfig, MemorySnapshotStore, start_coordinator};
//!
//! let store = Arc::new(MemorySnapshotStore::new());
//! let (coordinator, handle) = start_coordinator(&CoordinatorConfig::ephemeral(), store).await?;
//!
//! let (sink, mut frames) = ChannelSink::new();
//! let subscription = coordinator.subscribe(sink).await?;
//! coordinator.publish(event).await?;
//!
//! coordinator.shutdown().await?;
//! handle.await?;
//! ```

mod cache;
mod connection;
mod coordinator;
mod handle;
mod messages;
mod persistence;

pub use cache::{CacheChange, CacheLimits, CacheSnapshot, DEFAULT_CACHE_LIMIT, LiveCache};
pub use connection::{
    BroadcastOutcome, ChannelSink, ConnectionId, ConnectionRegistry, DEFAULT_SEND_TIMEOUT,
    LiveSink, SinkError, SinkFuture,
};
pub use coordinator::{
    CoordinatorArgs, CoordinatorConfig, DEFAULT_COORDINATOR_NAME, LiveCoordinator,
    start_coordinator,
};
pub use handle::Coordinator;
pub use messages::{CoordinatorError, CoordinatorMessage, PublishReport, Subscription};
pub use persistence::{
    FileSnapshotStore, MemorySnapshotStore, PersistFuture, PersistenceError, SnapshotBackend,
    SnapshotStore, open_snapshot_store,
};
