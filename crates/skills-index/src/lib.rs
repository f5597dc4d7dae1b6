//! Live skills document index.
//!
//! Catalogs a directory of skills, keeps a metadata index and a full-text
//! content index current as files change, and serves listing, loading,
//! search, validation, and usage-statistics operations over them.

pub mod change;
pub mod config;
pub mod error;
pub mod indexer;
pub mod models;
pub mod refresh;
pub mod search;
pub mod service;
pub mod tools;
pub mod usage;
pub mod validation;
pub mod watcher;

pub use change::{ChangeDetector, Detection};
pub use config::{AppConfig, IndexConfig, RefreshConfig, RefreshMode, SearchConfig, UsageConfig};
pub use error::{IndexError, Result};
pub use indexer::{build_snapshot, Layout, SkillIndexer};
pub use models::{
    BatchItem, BatchRequest, BatchResponse, ContentHit, ContentIndex, ContentUnit, Document,
    DocumentContent, DocumentList, DocumentSummary, ErrorPayload, IndexSnapshot, MatchType,
    MetadataHit, ReloadSummary, SearchResponse, SubUnit, SubUnitContent, ValidationError,
    ValidationReport,
};
pub use refresh::{RefreshHandle, RefreshLoop, TickOutcome};
pub use search::SearchService;
pub use service::{Outcome, SkillService};
pub use usage::{UsageStats, UsageTracker};
pub use validation::{validate_meta, validate_skills};
pub use watcher::FileWatcher;
