use std::sync::Arc;

use actors::Coordinator;
use pigmap_core::MIN_TOKEN_TTL_DAYS;
use serde::Deserialize;
use storage::Storage;

/// Tunables for report submission and listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportPolicy {
    /// Lifetime of a freshly issued edit token, clamped to 7..=30 days.
    pub edit_token_ttl_days: u32,
    pub default_list_limit: usize,
    pub max_list_limit: usize,
    /// Expose `POST /api/live/events` for publishing raw domain events.
    pub enable_event_relay: bool,
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            edit_token_ttl_days: MIN_TOKEN_TTL_DAYS,
            default_list_limit: 100,
            max_list_limit: 500,
            enable_event_relay: false,
        }
    }
}

impl ReportPolicy {
    pub fn list_limit(&self, requested: Option<usize>) -> usize {
        let max = self.max_list_limit.max(1);
        requested
            .unwrap_or(self.default_list_limit)
            .clamp(1, max)
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub storage: Storage,
    pub policy: Arc<ReportPolicy>,
}

impl AppState {
    pub fn new(coordinator: Coordinator, storage: Storage, policy: ReportPolicy) -> Self {
        Self {
            coordinator,
            storage,
            policy: Arc::new(policy),
        }
    }
}
