//! Bounded newest-first cache of recent reports and their comments.

use std::collections::{BTreeMap, HashMap, VecDeque};

use pigmap_core::{Comment, DomainEvent, Report, ReportId};
use serde::{Deserialize, Serialize};

/// Default bound for the report list and for each per-report comment list.
pub const DEFAULT_CACHE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    pub reports: usize,
    pub comments_per_report: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            reports: DEFAULT_CACHE_LIMIT,
            comments_per_report: DEFAULT_CACHE_LIMIT,
        }
    }
}

/// Serialized form of the cache, written to the snapshot store as one blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub comments: BTreeMap<ReportId, Vec<Comment>>,
}

/// What applying an event did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheChange {
    /// A report was prepended; `evicted` is true if the oldest fell off.
    ReportAdded { evicted: bool },
    /// A cached report was updated in place.
    ReportMerged,
    /// The updated report is not cached. Nothing changed.
    ReportMissed,
    /// A comment was prepended to its report's list.
    CommentAdded { evicted: bool },
}

#[derive(Debug, Clone, Default)]
pub struct LiveCache {
    reports: VecDeque<Report>,
    comments: HashMap<ReportId, VecDeque<Comment>>,
    limits: CacheLimits,
}

impl LiveCache {
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            reports: VecDeque::new(),
            comments: HashMap::new(),
            limits,
        }
    }

    /// Rebuild a cache from a stored snapshot, trimming to the current limits.
    pub fn from_snapshot(snapshot: CacheSnapshot, limits: CacheLimits) -> Self {
        let mut reports: VecDeque<Report> = snapshot.reports.into();
        reports.truncate(limits.reports);

        let comments = snapshot
            .comments
            .into_iter()
            .map(|(id, list)| {
                let mut list: VecDeque<Comment> = list.into();
                list.truncate(limits.comments_per_report);
                (id, list)
            })
            .collect();

        Self {
            reports,
            comments,
            limits,
        }
    }

    pub fn apply(&mut self, event: &DomainEvent) -> CacheChange {
        match event {
            DomainEvent::NewReport(report) => {
                self.reports.push_front(report.clone());
                let evicted = self.reports.len() > self.limits.reports;
                self.reports.truncate(self.limits.reports);
                CacheChange::ReportAdded { evicted }
            }
            DomainEvent::UpdatedReport(report) => {
                match self.reports.iter_mut().find(|r| r.id == report.id) {
                    Some(cached) => {
                        cached.merge_from(report);
                        CacheChange::ReportMerged
                    }
                    None => CacheChange::ReportMissed,
                }
            }
            DomainEvent::NewComment(comment) => {
                let list = self.comments.entry(comment.report_id.clone()).or_default();
                list.push_front(comment.clone());
                let evicted = list.len() > self.limits.comments_per_report;
                list.truncate(self.limits.comments_per_report);
                CacheChange::CommentAdded { evicted }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.comments.is_empty()
    }

    /// Number of cached reports.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    pub fn comments_for(&self, report_id: &ReportId) -> Vec<Comment> {
        self.comments
            .get(report_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            reports: self.reports.iter().cloned().collect(),
            comments: self
                .comments
                .iter()
                .map(|(id, list)| (id.clone(), list.iter().cloned().collect()))
                .collect(),
        }
    }
}
