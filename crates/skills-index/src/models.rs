//! Core data models for the skill index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ── Documents ───────────────────────────────────────────────────────────

/// Separately loadable piece of a skill, declared in its descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubUnit {
    /// Sub-unit identifier (e.g., "validation", "react").
    pub name: String,

    /// Path of the sub-unit file, relative to the skill directory.
    pub file: String,

    /// Optional keywords for search discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

/// One indexed skill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Catalog key. Always the containing directory name.
    pub name: String,

    /// Human-readable description of what the skill provides.
    pub description: String,

    /// Optional search tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Declared sub-units, in descriptor order.
    #[serde(rename = "sub_skills", default, skip_serializing_if = "Vec::is_empty")]
    pub sub_units: Vec<SubUnit>,
}

impl Document {
    /// Build a document from a parsed descriptor.
    ///
    /// The catalog name comes from the directory, never from the descriptor.
    /// Fields with the wrong shape are dropped here; the validator reports them.
    pub fn from_descriptor(dir_name: &str, meta: &Value) -> Self {
        let description = meta
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut tags: Vec<String> = Vec::new();
        for tag in string_items(meta.get("tags")) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let sub_units = meta
            .get("sub_skills")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(SubUnit::from_descriptor).collect())
            .unwrap_or_default();

        Self {
            name: dir_name.to_string(),
            description,
            tags,
            sub_units,
        }
    }

    /// Sub-unit names in declaration order.
    pub fn sub_unit_names(&self) -> Vec<String> {
        self.sub_units.iter().map(|s| s.name.clone()).collect()
    }

    /// Find a sub-unit by name.
    pub fn find_sub_unit(&self, name: &str) -> Option<&SubUnit> {
        self.sub_units.iter().find(|s| s.name == name)
    }
}

impl SubUnit {
    /// Build a sub-unit from one `sub_skills` element. Elements missing
    /// `name` or `file` are not loadable and yield `None`.
    fn from_descriptor(item: &Value) -> Option<Self> {
        let name = item.get("name")?.as_str()?.to_string();
        let file = item.get("file")?.as_str()?.to_string();
        Some(Self {
            name,
            file,
            triggers: string_items(item.get("triggers")),
        })
    }
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Advisory problem found while building the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    /// Directory name of the offending skill.
    pub document: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.document, self.message)
    }
}

// ── Content Index ───────────────────────────────────────────────────────

/// One indexed text body used for full-text search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentUnit {
    /// Owning skill.
    pub document: String,

    /// Derived from the file name; `None` for the primary document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_unit: Option<String>,

    /// Path relative to the skill directory.
    pub file: String,

    /// Lowercased searchable text.
    pub body: String,
}

impl ContentUnit {
    /// Index a skill's primary document.
    pub fn primary(document: impl Into<String>, file: impl Into<String>, text: &str) -> Self {
        Self {
            document: document.into(),
            sub_unit: None,
            file: file.into(),
            body: text.to_lowercase(),
        }
    }

    /// Index a reference or script document.
    pub fn sub_document(
        document: impl Into<String>,
        sub_unit: impl Into<String>,
        file: impl Into<String>,
        text: &str,
    ) -> Self {
        Self {
            document: document.into(),
            sub_unit: Some(sub_unit.into()),
            file: file.into(),
            body: text.to_lowercase(),
        }
    }

    /// Unique key: `skill:primary` or `skill:<relative file>`.
    pub fn key(&self) -> String {
        match &self.sub_unit {
            Some(_) => format!("{}:{}", self.document, self.file),
            None => format!("{}:primary", self.document),
        }
    }
}

/// Flat mapping of unit key to content unit. Ordered by key so that
/// search tie-breaking is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentIndex {
    units: BTreeMap<String, ContentUnit>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit, replacing any unit with the same key.
    pub fn insert(&mut self, unit: ContentUnit) {
        self.units.insert(unit.key(), unit);
    }

    pub fn get(&self, key: &str) -> Option<&ContentUnit> {
        self.units.get(key)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContentUnit)> {
        self.units.iter()
    }
}

// ── Snapshot ────────────────────────────────────────────────────────────

/// Immutable, fully built index state handed to readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Catalog in directory enumeration order.
    pub documents: Vec<Document>,

    /// Errors accumulated by the build that produced this snapshot.
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,

    /// Full-text units built in the same pass as `documents`.
    pub content: ContentIndex,

    /// When the build that produced this snapshot finished.
    pub built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Snapshot served before the first build completes.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), ContentIndex::new())
    }

    pub fn new(
        documents: Vec<Document>,
        validation_errors: Vec<ValidationError>,
        content: ContentIndex,
    ) -> Self {
        Self {
            documents,
            validation_errors,
            content,
            built_at: Utc::now(),
        }
    }

    /// Find a skill by catalog name.
    pub fn find(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ── Search ──────────────────────────────────────────────────────────────

/// Which metadata field produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Name,
    Description,
    Tags,
    Triggers,
}

/// A metadata search hit for a skill or one of its sub-units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataHit {
    pub document: String,
    pub sub_unit: Option<String>,
    pub score: f64,
    #[serde(rename = "match")]
    pub match_type: MatchType,
}

/// A full-text search hit with a display snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentHit {
    pub document: String,
    pub sub_unit: Option<String>,
    pub file: String,
    /// Rounded to three decimals.
    pub score: f64,
    pub snippet: String,
}

/// Ranked results echoing the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    pub query: String,
    pub results: Vec<T>,
}

impl<T> SearchResponse<T> {
    pub fn new(query: impl Into<String>, results: Vec<T>) -> Self {
        Self {
            query: query.into(),
            results,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn top(&self) -> Option<&T> {
        self.results.first()
    }
}

// ── Operation payloads ──────────────────────────────────────────────────

/// Catalog entry returned by `list_documents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub sub_units: Vec<String>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            name: doc.name.clone(),
            description: doc.description.clone(),
            tags: doc.tags.clone(),
            sub_units: doc.sub_unit_names(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
}

/// Primary document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub name: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub sub_units: Vec<String>,
    pub has_references: bool,
}

/// Sub-unit file content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubUnitContent {
    pub document: String,
    pub sub_unit: String,
    pub file: String,
    pub content: String,
}

/// Structured error payload returned instead of a fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub error: String,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// One request in a batch load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(alias = "domain")]
    pub document: String,
    #[serde(default, alias = "sub_skill")]
    pub sub_unit: Option<String>,
}

/// One result in a batch load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    SubUnit(SubUnitContent),
    Document(DocumentContent),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
}

/// Outcome of a forced rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub status: String,
    pub document_count: usize,
    pub content_units_indexed: usize,
    pub validation_errors: Vec<ValidationError>,
    pub built_at: DateTime<Utc>,
}

impl From<&IndexSnapshot> for ReloadSummary {
    fn from(snapshot: &IndexSnapshot) -> Self {
        Self {
            status: "reloaded".to_string(),
            document_count: snapshot.len(),
            content_units_indexed: snapshot.content.len(),
            validation_errors: snapshot.validation_errors.clone(),
            built_at: snapshot.built_at,
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────────

/// Full-tree validation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether all checks passed.
    pub valid: bool,

    /// Problems that must be fixed.
    pub errors: Vec<String>,

    /// Non-critical findings.
    pub warnings: Vec<String>,

    /// Number of skill directories checked.
    pub documents_checked: usize,
}

impl ValidationReport {
    /// Create a passing report.
    pub fn pass(documents_checked: usize) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            documents_checked,
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
        self.valid = false;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}
