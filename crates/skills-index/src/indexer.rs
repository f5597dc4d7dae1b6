//! Index construction and the published snapshot handle.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::models::{
    ContentIndex, ContentUnit, Document, DocumentContent, IndexSnapshot, SubUnitContent,
    ValidationError,
};
use crate::validation::validate_meta;

const REFERENCES_DIR: &str = "references";
const SCRIPTS_DIR: &str = "scripts";
const MARKDOWN_EXT: &str = "md";
const SCRIPT_SUFFIXES: [&str; 2] = [".js", ".ts"];

/// File names that make up a skill directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Metadata descriptor, e.g. `_meta.json`.
    pub meta_file: String,
    /// Primary document, e.g. `SKILL.md`.
    pub primary_file: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            meta_file: "_meta.json".into(),
            primary_file: "SKILL.md".into(),
        }
    }
}

impl From<&IndexConfig> for Layout {
    fn from(config: &IndexConfig) -> Self {
        Self {
            meta_file: config.meta_file.clone(),
            primary_file: config.primary_file.clone(),
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────

/// Immediate subdirectories of `root` that can hold a skill, in
/// enumeration order. Dot-prefixed directories are skipped.
pub(crate) fn document_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IndexError::NotFound(format!("Skills directory not found: {:?}", root))
        } else {
            IndexError::Read(format!("Failed to read skills directory {:?}: {}", root, e))
        }
    })?;

    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        dirs.push((name.to_string(), path));
    }
    Ok(dirs)
}

/// Read a file as text, replacing undecodable bytes.
pub(crate) fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read and parse a descriptor. Anything other than a JSON object is a
/// parse error.
pub(crate) fn load_descriptor(path: &Path) -> Result<Value> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let content = read_lossy(path)
        .map_err(|e| IndexError::Read(format!("Failed to read {:?}: {}", path, e)))?;

    let meta: Value = serde_json::from_str(&content)
        .map_err(|e| IndexError::Parse(format!("Invalid JSON in {}: {}", file_name, e)))?;

    if !meta.is_object() {
        return Err(IndexError::Parse(format!(
            "Invalid JSON in {}: expected an object",
            file_name
        )));
    }
    Ok(meta)
}

/// Reject anything that is not a single plain path component.
fn checked_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(IndexError::InvalidPath(name.to_string())),
    }
}

/// Reject relative paths that could leave the skill directory.
fn checked_relative(file: &str) -> Result<&Path> {
    let path = Path::new(file);
    let plain = path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain && path.components().next().is_some() {
        Ok(path)
    } else {
        Err(IndexError::InvalidPath(file.to_string()))
    }
}

// ── Builders ────────────────────────────────────────────────────────────

/// Catalog half of a snapshot.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    pub documents: Vec<Document>,
    pub validation_errors: Vec<ValidationError>,
}

/// Scan `root` and build the document catalog.
///
/// Parse failures exclude the document. Schema violations are recorded but
/// the document is still indexed under its directory name. Directories
/// without a descriptor are skipped silently.
pub fn build_metadata_index(root: &Path, layout: &Layout) -> Result<MetadataIndex> {
    let mut index = MetadataIndex::default();

    for (name, dir) in document_dirs(root)? {
        let meta_path = dir.join(&layout.meta_file);
        if !meta_path.is_file() {
            continue;
        }

        let meta = match load_descriptor(&meta_path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                index
                    .validation_errors
                    .push(ValidationError::new(&name, e.to_string()));
                continue;
            }
        };

        let errors = validate_meta(&meta, &name);
        if !errors.is_empty() {
            warn!("Validation errors in {}: {:?}", name, errors);
            index
                .validation_errors
                .extend(errors.into_iter().map(|e| ValidationError::new(&name, e)));
        }

        index.documents.push(Document::from_descriptor(&name, &meta));
    }

    debug!(
        "Built metadata index: {} skills, {} errors",
        index.documents.len(),
        index.validation_errors.len()
    );
    Ok(index)
}

/// Scan `root` and build the full-text content index.
pub fn build_content_index(root: &Path, layout: &Layout) -> Result<ContentIndex> {
    let mut index = ContentIndex::new();

    for (name, dir) in document_dirs(root)? {
        let primary = dir.join(&layout.primary_file);
        if primary.is_file() {
            match read_lossy(&primary) {
                Ok(text) => index.insert(ContentUnit::primary(
                    &name,
                    layout.primary_file.as_str(),
                    &text,
                )),
                Err(e) => warn!("Failed to read {:?}: {}", primary, e),
            }
        }

        index_markdown_dir(&mut index, &name, &dir, REFERENCES_DIR, |stem| {
            stem.to_string()
        });
        index_markdown_dir(&mut index, &name, &dir, SCRIPTS_DIR, strip_script_suffix);
    }

    debug!("Built content index: {} units", index.len());
    Ok(index)
}

/// Index markdown files directly under `skill_dir/sub_dir`.
fn index_markdown_dir(
    index: &mut ContentIndex,
    document: &str,
    skill_dir: &Path,
    sub_dir: &str,
    sub_unit_name: impl Fn(&str) -> String,
) {
    let dir = skill_dir.join(sub_dir);
    let Ok(entries) = fs::read_dir(&dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(MARKDOWN_EXT) {
            continue;
        }
        let (Some(file_name), Some(stem)) = (
            path.file_name().and_then(|n| n.to_str()),
            path.file_stem().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        match read_lossy(&path) {
            Ok(text) => index.insert(ContentUnit::sub_document(
                document,
                sub_unit_name(stem),
                format!("{}/{}", sub_dir, file_name),
                &text,
            )),
            Err(e) => warn!("Failed to read {:?}: {}", path, e),
        }
    }
}

fn strip_script_suffix(stem: &str) -> String {
    SCRIPT_SUFFIXES
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(stem)
        .to_string()
}

/// Build a complete snapshot from scratch.
pub fn build_snapshot(root: &Path, layout: &Layout) -> Result<IndexSnapshot> {
    let metadata = build_metadata_index(root, layout)?;
    let content = build_content_index(root, layout)?;
    Ok(IndexSnapshot::new(
        metadata.documents,
        metadata.validation_errors,
        content,
    ))
}

// ── Indexer ─────────────────────────────────────────────────────────────

/// Owns the skill root and the currently published snapshot.
///
/// Readers fetch an `Arc` to the current snapshot and never hold the lock
/// while they work. Rebuilds happen outside the lock; publishing is a
/// single pointer swap.
pub struct SkillIndexer {
    root: PathBuf,
    layout: Layout,
    current: RwLock<Arc<IndexSnapshot>>,
    rebuild: Mutex<()>,
}

impl SkillIndexer {
    /// Create an indexer with the default layout. Serves an empty snapshot
    /// until the first reload.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_layout(root, Layout::default())
    }

    pub fn with_layout(root: impl AsRef<Path>, layout: Layout) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            layout,
            current: RwLock::new(Arc::new(IndexSnapshot::empty())),
            rebuild: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Rebuild both indexes from disk and publish the result.
    ///
    /// On failure the previous snapshot stays published.
    pub fn reload(&self) -> Result<Arc<IndexSnapshot>> {
        let _writer = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        info!("Reloading skill indexes from {:?}", self.root);

        let snapshot = Arc::new(build_snapshot(&self.root, &self.layout)?);
        self.publish(Arc::clone(&snapshot));

        info!(
            "Index reload complete: {} skills, {} content units",
            snapshot.len(),
            snapshot.content.len()
        );
        Ok(snapshot)
    }

    /// Swap in a fully built snapshot.
    pub fn publish(&self, snapshot: Arc<IndexSnapshot>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    /// Check if a skill has a references directory.
    pub fn has_references(&self, name: &str) -> bool {
        self.root.join(name).join(REFERENCES_DIR).is_dir()
    }

    /// Read a skill's primary document from disk.
    pub fn read_document(&self, name: &str) -> Result<DocumentContent> {
        let not_found = || IndexError::NotFound(format!("Skill '{}' not found", name));

        let name = checked_name(name).map_err(|_| not_found())?;
        let primary = self.root.join(name).join(&self.layout.primary_file);
        if !primary.is_file() {
            return Err(not_found());
        }

        let content = read_lossy(&primary).map_err(|e| {
            IndexError::Read(format!("Failed to read {}: {}", primary.display(), e))
        })?;

        let snapshot = self.snapshot();
        let doc = snapshot.find(name);

        Ok(DocumentContent {
            name: name.to_string(),
            description: doc.map(|d| d.description.clone()).unwrap_or_default(),
            content,
            tags: doc.map(|d| d.tags.clone()).unwrap_or_default(),
            sub_units: doc.map(Document::sub_unit_names).unwrap_or_default(),
            has_references: self.has_references(name),
        })
    }

    /// Read a declared sub-unit's file from disk.
    pub fn read_sub_unit(&self, document: &str, sub_unit: &str) -> Result<SubUnitContent> {
        let snapshot = self.snapshot();
        let doc = snapshot
            .find(document)
            .ok_or_else(|| IndexError::NotFound(format!("Skill '{}' not found", document)))?;

        let sub = doc.find_sub_unit(sub_unit).ok_or_else(|| {
            IndexError::NotFound(format!(
                "Sub-skill '{}' not found in '{}'",
                sub_unit, document
            ))
        })?;

        let relative = checked_relative(&sub.file)?;
        let path = self.root.join(&doc.name).join(relative);
        if !path.is_file() {
            return Err(IndexError::NotFound(format!("File not found: {}", sub.file)));
        }

        let content = read_lossy(&path)
            .map_err(|e| IndexError::Read(format!("Failed to read {}: {}", path.display(), e)))?;

        Ok(SubUnitContent {
            document: doc.name.clone(),
            sub_unit: sub.name.clone(),
            file: sub.file.clone(),
            content,
        })
    }
}
