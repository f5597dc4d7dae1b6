//! Process-wide usage counters and recent-query history.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::UsageConfig;

/// Optional context attached to a recorded operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageDetails<'a> {
    /// Skill that was loaded.
    pub document: Option<&'a str>,
    /// Search query that was run.
    pub query: Option<&'a str>,
}

impl<'a> UsageDetails<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn document(document: &'a str) -> Self {
        Self {
            document: Some(document),
            query: None,
        }
    }

    pub fn query(query: &'a str) -> Self {
        Self {
            document: None,
            query: Some(query),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentQuery {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-only copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub uptime_since: DateTime<Utc>,
    pub tool_calls: BTreeMap<String, u64>,
    pub document_loads: BTreeMap<String, u64>,
    /// Most recent queries, oldest first.
    pub recent_queries: Vec<RecentQuery>,
}

/// Usage report returned by `get_usage_stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(flatten)]
    pub usage: UsageSnapshot,
    pub total_documents: usize,
    pub content_units_indexed: usize,
}

/// Counters shared by every caller.
///
/// Each counter family sits behind its own short-lived lock. A poisoned
/// lock is recovered, since every update leaves the maps consistent.
#[derive(Debug)]
pub struct UsageTracker {
    start_time: DateTime<Utc>,
    capacity: usize,
    display: usize,
    tool_calls: Mutex<HashMap<String, u64>>,
    document_loads: Mutex<HashMap<String, u64>>,
    queries: Mutex<VecDeque<RecentQuery>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::with_config(&UsageConfig::default())
    }

    pub fn with_config(config: &UsageConfig) -> Self {
        Self {
            start_time: Utc::now(),
            capacity: config.history_capacity,
            display: config.recent_display,
            tool_calls: Mutex::new(HashMap::new()),
            document_loads: Mutex::new(HashMap::new()),
            queries: Mutex::new(VecDeque::with_capacity(config.history_capacity)),
        }
    }

    /// Count one call of `operation`, plus any document load or query.
    pub fn record(&self, operation: &str, details: UsageDetails<'_>) {
        {
            let mut calls = self.tool_calls.lock().unwrap_or_else(PoisonError::into_inner);
            *calls.entry(operation.to_string()).or_insert(0) += 1;
        }

        if let Some(document) = details.document {
            let mut loads = self
                .document_loads
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *loads.entry(document.to_string()).or_insert(0) += 1;
        }

        if let Some(query) = details.query {
            let mut queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
            queries.push_back(RecentQuery {
                query: query.to_string(),
                timestamp: Utc::now(),
            });
            while queries.len() > self.capacity {
                queries.pop_front();
            }
        }
    }

    /// All retained queries, oldest first.
    pub fn history(&self) -> Vec<RecentQuery> {
        let queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
        queries.iter().cloned().collect()
    }

    /// Copy of the counters with the most recent queries.
    pub fn snapshot(&self) -> UsageSnapshot {
        let tool_calls = {
            let calls = self.tool_calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        let document_loads = {
            let loads = self
                .document_loads
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            loads.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        let recent_queries = {
            let queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
            let skip = queries.len().saturating_sub(self.display);
            queries.iter().skip(skip).cloned().collect()
        };

        UsageSnapshot {
            uptime_since: self.start_time,
            tool_calls,
            document_loads,
            recent_queries,
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}
