//! Public operations over the live index.
//!
//! Every operation records usage and returns data. Failures come back as
//! [`ErrorPayload`] values rather than faults.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::indexer::{Layout, SkillIndexer};
use crate::models::{
    BatchItem, BatchRequest, BatchResponse, ContentHit, DocumentContent, DocumentList,
    DocumentSummary, ErrorPayload, MetadataHit, ReloadSummary, SearchResponse, SubUnitContent,
    ValidationReport,
};
use crate::search::SearchService;
use crate::usage::{UsageDetails, UsageStats, UsageTracker};
use crate::validation::validate_skills;

/// Result of an operation that can fail with a named outcome.
pub type Outcome<T> = std::result::Result<T, ErrorPayload>;

/// Operations layer shared by every host surface.
pub struct SkillService {
    indexer: Arc<SkillIndexer>,
    search: SearchService,
    usage: Arc<UsageTracker>,
}

impl SkillService {
    /// Create a service with default search and usage settings.
    pub fn new(indexer: Arc<SkillIndexer>) -> Self {
        let search = SearchService::new(Arc::clone(&indexer));
        Self {
            indexer,
            search,
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Create a service, and its indexer, from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let indexer = Arc::new(SkillIndexer::with_layout(
            &config.index.root,
            Layout::from(&config.index),
        ));
        let search = SearchService::with_settings(Arc::clone(&indexer), config.search.clone());
        Self {
            indexer,
            search,
            usage: Arc::new(UsageTracker::with_config(&config.usage)),
        }
    }

    pub fn indexer(&self) -> &Arc<SkillIndexer> {
        &self.indexer
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    /// All cataloged skills with their sub-unit names.
    pub fn list_documents(&self) -> DocumentList {
        self.usage.record("list_documents", UsageDetails::none());
        let snapshot = self.indexer.snapshot();
        DocumentList {
            documents: snapshot.documents.iter().map(DocumentSummary::from).collect(),
        }
    }

    /// A skill's primary document.
    pub fn get_document(&self, name: &str) -> Outcome<DocumentContent> {
        self.usage.record("get_document", UsageDetails::document(name));
        self.indexer.read_document(name).map_err(error_payload)
    }

    /// One declared sub-unit of a skill.
    pub fn get_sub_unit(&self, document: &str, sub_unit: &str) -> Outcome<SubUnitContent> {
        self.usage
            .record("get_sub_unit", UsageDetails::document(document));
        self.indexer
            .read_sub_unit(document, sub_unit)
            .map_err(error_payload)
    }

    /// Load several skills and sub-units; each request succeeds or fails
    /// on its own.
    pub fn get_documents_batch(&self, requests: &[BatchRequest]) -> BatchResponse {
        self.usage
            .record("get_documents_batch", UsageDetails::none());

        let results = requests
            .iter()
            .map(|req| match &req.sub_unit {
                Some(sub) => match self.get_sub_unit(&req.document, sub) {
                    Ok(content) => BatchItem::SubUnit(content),
                    Err(e) => BatchItem::Error(e),
                },
                None => match self.get_document(&req.document) {
                    Ok(content) => BatchItem::Document(content),
                    Err(e) => BatchItem::Error(e),
                },
            })
            .collect();

        BatchResponse { results }
    }

    /// Field-priority search over skill metadata.
    pub fn search_metadata(&self, query: &str, limit: Option<usize>) -> SearchResponse<MetadataHit> {
        self.usage
            .record("search_metadata", UsageDetails::query(query));
        self.search.search_metadata(query, limit)
    }

    /// Full-text search with snippets.
    pub fn search_content(&self, query: &str, limit: Option<usize>) -> SearchResponse<ContentHit> {
        self.usage
            .record("search_content", UsageDetails::query(query));
        self.search.search_content(query, limit)
    }

    /// Rebuild immediately, bypassing the poll interval.
    pub fn reload(&self) -> Outcome<ReloadSummary> {
        self.usage.record("reload", UsageDetails::none());
        self.indexer
            .reload()
            .map(|snapshot| ReloadSummary::from(snapshot.as_ref()))
            .map_err(error_payload)
    }

    pub fn get_usage_stats(&self) -> UsageStats {
        self.usage.record("get_usage_stats", UsageDetails::none());
        let snapshot = self.indexer.snapshot();
        UsageStats {
            usage: self.usage.snapshot(),
            total_documents: snapshot.len(),
            content_units_indexed: snapshot.content.len(),
        }
    }

    /// Check every skill directory on disk.
    pub fn validate_all(&self) -> ValidationReport {
        self.usage.record("validate_all", UsageDetails::none());
        validate_skills(self.indexer.root(), self.indexer.layout())
    }
}

fn error_payload(e: impl std::fmt::Display) -> ErrorPayload {
    ErrorPayload::new(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SkillService) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let forms = root.join("forms");
        fs::create_dir_all(forms.join("references")).unwrap();
        fs::write(
            forms.join("_meta.json"),
            r#"{"name": "forms", "description": "Form handling patterns",
                "tags": ["validation", "input"],
                "sub_skills": [{"name": "react", "file": "references/react.md",
                                "triggers": ["useForm"]}]}"#,
        )
        .unwrap();
        fs::write(forms.join("SKILL.md"), "# Forms\n\nUse these patterns.").unwrap();
        fs::write(
            forms.join("references/react.md"),
            "# React\n\nThe useForm hook wires inputs.",
        )
        .unwrap();

        write_plain(root, "alpha", r#"{"name": "alpha", "description": "writes CSV files", "tags": ["io"]}"#);

        let service = SkillService::new(Arc::new(SkillIndexer::new(root)));
        service.indexer().reload().unwrap();
        (temp_dir, service)
    }

    fn write_plain(root: &Path, name: &str, meta: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("_meta.json"), meta).unwrap();
        fs::write(dir.join("SKILL.md"), format!("# {}", name)).unwrap();
    }

    #[test]
    fn test_list_documents() {
        let (_tmp, service) = setup();
        let list = service.list_documents();
        assert_eq!(list.documents.len(), 2);

        let forms = list.documents.iter().find(|d| d.name == "forms").unwrap();
        assert_eq!(forms.sub_units, vec!["react"]);
        assert_eq!(forms.tags, vec!["validation", "input"]);
    }

    #[test]
    fn test_get_document_and_sub_unit() {
        let (_tmp, service) = setup();

        let doc = service.get_document("forms").unwrap();
        assert!(doc.content.starts_with("# Forms"));
        assert_eq!(doc.sub_units, vec!["react"]);
        assert!(doc.has_references);

        let sub = service.get_sub_unit("forms", "react").unwrap();
        assert!(sub.content.contains("useForm hook"));

        let err = service.get_document("missing").unwrap_err();
        assert_eq!(err.error, "Skill 'missing' not found");
    }

    #[test]
    fn test_batch_mixes_results_and_errors() {
        let (_tmp, service) = setup();
        let requests = vec![
            BatchRequest {
                document: "forms".to_string(),
                sub_unit: None,
            },
            BatchRequest {
                document: "forms".to_string(),
                sub_unit: Some("react".to_string()),
            },
            BatchRequest {
                document: "forms".to_string(),
                sub_unit: Some("vue".to_string()),
            },
        ];

        let batch = service.get_documents_batch(&requests);
        assert_eq!(batch.results.len(), 3);
        assert!(matches!(batch.results[0], BatchItem::Document(_)));
        assert!(matches!(batch.results[1], BatchItem::SubUnit(_)));
        match &batch.results[2] {
            BatchItem::Error(e) => assert_eq!(e.error, "Sub-skill 'vue' not found in 'forms'"),
            other => panic!("expected error, got {:?}", other),
        }

        let stats = service.get_usage_stats();
        assert_eq!(stats.usage.tool_calls["get_documents_batch"], 1);
        assert_eq!(stats.usage.tool_calls["get_document"], 1);
        assert_eq!(stats.usage.tool_calls["get_sub_unit"], 2);
        assert_eq!(stats.usage.document_loads["forms"], 3);
    }

    #[test]
    fn test_search_scenarios() {
        let (_tmp, service) = setup();

        let meta = service.search_metadata("csv", Some(5));
        assert_eq!(meta.len(), 1);
        let hit = meta.top().unwrap();
        assert_eq!(hit.document, "alpha");
        assert_eq!(hit.score, 0.7);

        let meta = service.search_metadata("useform", None);
        assert_eq!(meta.top().unwrap().sub_unit.as_deref(), Some("react"));

        let content = service.search_content("useform hook", None);
        let top = content.top().unwrap();
        assert_eq!(top.document, "forms");
        assert_eq!(top.sub_unit.as_deref(), Some("react"));
        assert_eq!(top.file, "references/react.md");
        assert_eq!(top.score, 1.2);
    }

    #[test]
    fn test_recent_queries_bounded() {
        let (_tmp, service) = setup();
        for i in 0..150 {
            service.search_content(&format!("q{}", i), None);
        }

        let history = service.usage().history();
        assert_eq!(history.len(), 100);
        assert!(!history.iter().any(|q| q.query == "q0" || q.query == "q49"));
        assert_eq!(history[0].query, "q50");

        let stats = service.get_usage_stats();
        assert_eq!(stats.usage.recent_queries.len(), 10);
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.content_units_indexed, 3);
    }

    #[test]
    fn test_reload_summary() {
        let (tmp, service) = setup();
        write_plain(tmp.path(), "beta", r#"{"name": "gamma", "description": "Mismatch"}"#);

        let first = service.reload().unwrap();
        assert_eq!(first.status, "reloaded");
        assert_eq!(first.document_count, 3);
        assert_eq!(first.content_units_indexed, 4);
        assert_eq!(first.validation_errors.len(), 1);
        assert_eq!(first.validation_errors[0].document, "beta");

        let second = service.reload().unwrap();
        assert_eq!(second.document_count, first.document_count);
        assert_eq!(second.content_units_indexed, first.content_units_indexed);
        assert_eq!(second.validation_errors, first.validation_errors);
        assert!(second.built_at >= first.built_at);
        assert_eq!(second.built_at, service.indexer().snapshot().built_at);
    }

    #[test]
    fn test_reload_failure_is_payload() {
        let temp_dir = TempDir::new().unwrap();
        let service = SkillService::new(Arc::new(SkillIndexer::new(
            temp_dir.path().join("absent"),
        )));
        let err = service.reload().unwrap_err();
        assert!(err.error.starts_with("Skills directory not found"));
    }

    #[test]
    fn test_validate_all() {
        let (_tmp, service) = setup();
        let report = service.validate_all();
        assert!(report.valid);
        assert_eq!(report.documents_checked, 2);
        assert!(report
            .warnings
            .contains(&"alpha: No sub-skills defined (standalone skill)".to_string()));
    }

    #[test]
    fn test_every_operation_is_counted() {
        let (_tmp, service) = setup();
        service.list_documents();
        let _ = service.reload();
        service.validate_all();
        let stats = service.get_usage_stats();

        for op in ["list_documents", "reload", "validate_all", "get_usage_stats"] {
            assert_eq!(stats.usage.tool_calls[op], 1, "{}", op);
        }
    }
}
