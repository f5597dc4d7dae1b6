//! Descriptor schema checks and full-tree validation.

use std::path::Path;

use serde_json::Value;

use crate::indexer::{document_dirs, load_descriptor, Layout};
use crate::models::ValidationReport;

const REQUIRED_FIELDS: [&str; 2] = ["name", "description"];
const SUB_UNIT_REQUIRED_FIELDS: [&str; 2] = ["name", "file"];

/// Check a parsed descriptor against the schema.
///
/// Every rule is applied independently, so all violations are reported.
/// An empty result means the descriptor is valid.
pub fn validate_meta(meta: &Value, expected_name: &str) -> Vec<String> {
    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if meta.get(field).is_none() {
            errors.push(format!("Missing required field '{}'", field));
        }
    }

    if let Some(name) = meta.get("name") {
        if name.as_str() != Some(expected_name) {
            errors.push(format!(
                "'name' field ({}) doesn't match directory name",
                display_value(name)
            ));
        }
    }

    if let Some(tags) = meta.get("tags") {
        if !tags.is_array() {
            errors.push("'tags' must be a list".to_string());
        }
    }

    if let Some(sub_units) = meta.get("sub_skills") {
        match sub_units.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    for field in SUB_UNIT_REQUIRED_FIELDS {
                        if item.get(field).is_none() {
                            errors.push(format!(
                                "sub_skill[{}] missing required field '{}'",
                                i, field
                            ));
                        }
                    }
                }
            }
            None => errors.push("'sub_skills' must be a list".to_string()),
        }
    }

    errors
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validate every skill directory under `root`: descriptors, primary
/// files, and declared sub-unit files.
pub fn validate_skills(root: &Path, layout: &Layout) -> ValidationReport {
    let dirs = match document_dirs(root) {
        Ok(dirs) => dirs,
        Err(e) => {
            let mut report = ValidationReport::pass(0);
            report.add_error(format!("Skills directory {:?} unreadable: {}", root, e));
            return report;
        }
    };

    let mut report = ValidationReport::pass(dirs.len());

    for (name, dir) in &dirs {
        let meta_path = dir.join(&layout.meta_file);
        if !meta_path.is_file() {
            report.add_error(format!("{}: Missing {}", name, layout.meta_file));
            continue;
        }

        if !dir.join(&layout.primary_file).is_file() {
            report.add_error(format!("{}: Missing {}", name, layout.primary_file));
        }

        let meta = match load_descriptor(&meta_path) {
            Ok(meta) => meta,
            Err(e) => {
                report.add_error(format!("{}: {}", name, e));
                continue;
            }
        };

        for err in validate_meta(&meta, name) {
            report.add_error(format!("{}: {}", name, err));
        }

        let sub_units = meta.get("sub_skills").and_then(Value::as_array);
        for file in sub_units
            .into_iter()
            .flatten()
            .filter_map(|sub| sub.get("file").and_then(Value::as_str))
        {
            if !dir.join(file).is_file() {
                report.add_error(format!("{}: Sub-skill file not found: {}", name, file));
            }
        }

        let has_tags = meta
            .get("tags")
            .and_then(Value::as_array)
            .is_some_and(|t| !t.is_empty());
        if !has_tags {
            report.add_warning(format!("{}: No tags defined", name));
        }

        if !sub_units.is_some_and(|s| !s.is_empty()) {
            report.add_warning(format!(
                "{}: No sub-skills defined (standalone skill)",
                name
            ));
        }
    }

    report
}
