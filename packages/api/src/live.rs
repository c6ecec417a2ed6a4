//! Live updates: the WebSocket endpoint and read-only views of the
//! coordinator's cache.

use actors::{Coordinator, CoordinatorError, LiveSink, SinkError, SinkFuture};
use axum::{
    Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use pigmap_core::{Comment, DomainEvent, Report, ReportId};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::ApiError;
use crate::state::AppState;

/// Publish a committed event. Returns false when the live side failed, in
/// which case the caller answers with a degraded success.
pub(crate) async fn publish_event(coordinator: &Coordinator, event: DomainEvent) -> bool {
    let kind = event.kind();
    match coordinator.publish(event).await {
        Ok(report) => {
            tracing::debug!(
                "Published {}: delivered {}, dropped {}",
                kind,
                report.delivered,
                report.dropped.len()
            );
            true
        }
        Err(CoordinatorError::Unpersisted { report, source }) => {
            tracing::warn!(
                "Live publish of {} degraded: delivered {}, snapshot failed: {}",
                kind,
                report.delivered,
                source
            );
            false
        }
        Err(e) => {
            tracing::warn!("Live publish of {} degraded: {}", kind, e);
            false
        }
    }
}

/// Frames queued per connection before the client counts as too slow.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Queue in front of one WebSocket's writer task. Sends never wait on the
/// socket; a full or closed queue fails the send.
pub struct WsSink {
    tx: Option<mpsc::Sender<String>>,
}

impl WsSink {
    /// Spawn the writer task that owns the socket's write half.
    pub fn spawn(mut socket: SplitSink<WebSocket, Message>) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = socket.send(Message::Text(frame.into())).await {
                    tracing::debug!("Live socket write failed: {}", e);
                    return;
                }
            }
            let _ = socket.close().await;
        });
        Self { tx: Some(tx) }
    }
}

impl LiveSink for WsSink {
    fn send<'a>(&'a mut self, frame: &'a str) -> SinkFuture<'a> {
        let result = match &self.tx {
            Some(tx) => tx.try_send(frame.to_string()).map_err(|e| match e {
                TrySendError::Full(_) => SinkError("outbound queue full".into()),
                TrySendError::Closed(_) => SinkError("socket closed".into()),
            }),
            None => Err(SinkError("socket closed".into())),
        };
        Box::pin(async move { result })
    }

    fn close(&mut self) -> SinkFuture<'_> {
        // Dropping the sender lets the writer flush what is queued, then close.
        self.tx = None;
        Box::pin(async { Ok(()) })
    }
}

/// `GET /api/live`: upgrades to a WebSocket subscribed to the coordinator.
pub async fn socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(socket, state.coordinator))
}

async fn run_connection(socket: WebSocket, coordinator: Coordinator) {
    let (tx, mut rx) = socket.split();

    let subscription = match coordinator.subscribe(WsSink::spawn(tx)).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!("Live subscribe failed: {}", e);
            return;
        }
    };
    tracing::info!("Live connection {} opened", subscription.id);

    // Client frames carry nothing; read until the peer goes away.
    while let Some(msg) = rx.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    coordinator.unsubscribe(subscription.id);
    tracing::info!("Live connection {} closed", subscription.id);
}

/// `GET /api/live/reports`
pub async fn reports(State(state): State<AppState>) -> Result<Json<Vec<Report>>, ApiError> {
    Ok(Json(state.coordinator.recent_reports().await?))
}

/// `GET /api/live/reports/{id}/comments`
pub async fn comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state.coordinator.comments_for(ReportId::from(id)).await?;
    Ok(Json(comments))
}

#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub kind: &'static str,
    pub delivered: usize,
    pub dropped: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// `POST /api/live/events`: publish a raw `{kind, payload}` event.
///
/// Only routed when the policy enables it. Nothing is written to the
/// database.
pub async fn relay(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let event = DomainEvent::from_json(body)?;
    let kind = event.kind();

    match state.coordinator.publish(event).await {
        Ok(report) => Ok((
            StatusCode::OK,
            Json(RelayResponse {
                kind,
                delivered: report.delivered,
                dropped: report.dropped.len(),
                degraded: false,
            }),
        )),
        Err(CoordinatorError::Unpersisted { report, source }) => {
            tracing::warn!("Relayed {} without a snapshot: {}", kind, source);
            Ok((
                StatusCode::ACCEPTED,
                Json(RelayResponse {
                    kind,
                    delivered: report.delivered,
                    dropped: report.dropped.len(),
                    degraded: true,
                }),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub connections: Option<usize>,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.connection_count().await {
        Ok(n) => (
            StatusCode::OK,
            Json(Health {
                status: "ok",
                connections: Some(n),
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health {
                    status: "unavailable",
                    connections: None,
                }),
            )
        }
    }
}
