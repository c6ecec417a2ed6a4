//! HTTP gateway for PigMap.
//!
//! Durable writes go to the database first; the resulting domain event is
//! then handed to the live coordinator, which fans it out to WebSocket
//! subscribers. A failed live publish never fails the request: the write
//! already happened, so the handler answers `202` with `"degraded": true`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = api::router(AppState::new(coordinator, storage, policy));
//! axum::serve(listener, app).await?;
//! ```

pub mod comments;
pub mod error;
pub mod live;
pub mod media;
pub mod reports;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, ReportPolicy};

/// Build the full router for `state`.
pub fn router(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/health", get(live::health))
        // Reports
        .route("/api/reports", get(reports::list).post(reports::create))
        .route("/api/reports/{id}", put(reports::update))
        .route(
            "/api/reports/{id}/comments",
            get(comments::list).post(comments::create),
        )
        // Live
        .route("/api/live", get(live::socket))
        .route("/api/live/reports", get(live::reports))
        .route("/api/live/reports/{id}/comments", get(live::comments))
        // Media
        .route("/media/{*key}", get(media::serve));

    if state.policy.enable_event_relay {
        router = router.route("/api/live/events", post(live::relay));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
