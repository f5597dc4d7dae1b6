//! Metadata and full-text search with snippet extraction.
//!
//! Metadata search reports the single best field per item. Content search
//! scores phrase and word overlap in the body. The two scoring models are
//! independent and their scores are not comparable.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::config::SearchConfig;
use crate::indexer::SkillIndexer;
use crate::models::{ContentHit, IndexSnapshot, MatchType, MetadataHit, SearchResponse};

const NAME_SCORE: f64 = 0.9;
const DESCRIPTION_SCORE: f64 = 0.7;
const TAG_SCORE: f64 = 0.8;
const SUB_UNIT_NAME_SCORE: f64 = 0.85;
const TRIGGER_SCORE: f64 = 0.9;

const PHRASE_SCORE: f64 = 1.0;
const PHRASE_INTRO_SCORE: f64 = 1.2;
const ALL_WORDS_SCORE: f64 = 0.7;
const FREQUENCY_STEP: f64 = 0.05;
const FREQUENCY_CAP: f64 = 0.2;
const SOME_WORDS_SCORE: f64 = 0.3;

// ── Metadata Search ─────────────────────────────────────────────────────

/// Rank skills and sub-units by case-insensitive substring match over
/// declared metadata.
///
/// A skill reports at most one match, checked in the order name,
/// description, tags. Sub-units score independently of their parent.
/// Ties keep discovery order.
pub fn search_metadata(snapshot: &IndexSnapshot, query: &str, limit: usize) -> Vec<MetadataHit> {
    let query = query.to_lowercase();
    if query.trim().is_empty() {
        return Vec::new();
    }
    let matches = |field: &str| field.to_lowercase().contains(&query);

    let mut results = Vec::new();

    for doc in &snapshot.documents {
        let doc_match = if matches(&doc.name) {
            Some((NAME_SCORE, MatchType::Name))
        } else if matches(&doc.description) {
            Some((DESCRIPTION_SCORE, MatchType::Description))
        } else if doc.tags.iter().any(|t| matches(t)) {
            Some((TAG_SCORE, MatchType::Tags))
        } else {
            None
        };

        if let Some((score, match_type)) = doc_match {
            results.push(MetadataHit {
                document: doc.name.clone(),
                sub_unit: None,
                score,
                match_type,
            });
        }

        for sub in &doc.sub_units {
            let sub_match = if matches(&sub.name) {
                Some((SUB_UNIT_NAME_SCORE, MatchType::Name))
            } else if sub.triggers.iter().any(|t| matches(t)) {
                Some((TRIGGER_SCORE, MatchType::Triggers))
            } else {
                None
            };

            if let Some((score, match_type)) = sub_match {
                results.push(MetadataHit {
                    document: doc.name.clone(),
                    sub_unit: Some(sub.name.clone()),
                    score,
                    match_type,
                });
            }
        }
    }

    sort_by_score(&mut results, |hit| hit.score);
    results.truncate(limit);
    results
}

// ── Content Search ──────────────────────────────────────────────────────

/// Score one lowercased body against a lowercased query.
///
/// Exact phrase: 1.0, or 1.2 when the first occurrence ends within
/// `intro_window` characters. All words present: 0.7 plus 0.05 per
/// occurrence, capped at +0.2. Some words present: 0.3 scaled by the
/// fraction matched. Otherwise 0.
pub fn content_score(body: &str, query: &str, words: &[&str], intro_window: usize) -> f64 {
    if query.is_empty() || words.is_empty() {
        return 0.0;
    }

    if let Some(pos) = body.find(query) {
        let end = body[..pos].chars().count() + query.chars().count();
        return if end <= intro_window {
            PHRASE_INTRO_SCORE
        } else {
            PHRASE_SCORE
        };
    }

    let matched = words.iter().filter(|w| body.contains(**w)).count();
    if matched == words.len() {
        let occurrences: usize = words.iter().map(|w| body.matches(*w).count()).sum();
        ALL_WORDS_SCORE + (occurrences as f64 * FREQUENCY_STEP).min(FREQUENCY_CAP)
    } else if matched > 0 {
        SOME_WORDS_SCORE * (matched as f64 / words.len() as f64)
    } else {
        0.0
    }
}

/// Rank content units against `query`, attaching a snippet to each hit.
pub fn search_content(
    snapshot: &IndexSnapshot,
    query: &str,
    limit: usize,
    settings: &SearchConfig,
) -> Vec<ContentHit> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();

    for (_, unit) in snapshot.content.iter() {
        let score = content_score(&unit.body, &query, &words, settings.intro_window);
        if score <= 0.0 {
            continue;
        }

        results.push(ContentHit {
            document: unit.document.clone(),
            sub_unit: unit.sub_unit.clone(),
            file: unit.file.clone(),
            score: round3(score),
            snippet: extract_snippet(
                &unit.body,
                &query,
                settings.snippet_length,
                settings.snippet_lead,
            ),
        });
    }

    sort_by_score(&mut results, |hit| hit.score);
    results.truncate(limit);
    results
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Stable descending sort.
fn sort_by_score<T>(results: &mut [T], score: impl Fn(&T) -> f64) {
    results.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
}

// ── Snippet Extraction ──────────────────────────────────────────────────

/// Extract a display window around the first match of `query`.
///
/// Falls back to the first query word found, then to the start of the
/// body. The window begins `lead` characters before the match and ends
/// `max_length` characters after its start. Ellipses mark each side that
/// does not reach the body boundary.
pub fn extract_snippet(body: &str, query: &str, max_length: usize, lead: usize) -> String {
    let pos = Some(query)
        .filter(|q| !q.is_empty())
        .and_then(|q| body.find(q))
        .or_else(|| query.split_whitespace().find_map(|w| body.find(w)));

    let (start, end) = match pos {
        Some(pos) => (
            chars_before(body, pos, lead),
            chars_after(body, pos, max_length),
        ),
        None => (0, chars_after(body, 0, max_length)),
    };

    let mut snippet = String::with_capacity(end - start + 6);
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&body[start..end]);
    if end < body.len() {
        snippet.push_str("...");
    }

    snippet.replace(&['\r', '\n'][..], " ").trim().to_string()
}

/// Byte offset `n` characters before `pos`, clamped to 0.
fn chars_before(s: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    s[..pos]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte offset `n` characters after `pos`, clamped to the end.
fn chars_after(s: &str, pos: usize, n: usize) -> usize {
    s[pos..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| pos + i)
        .unwrap_or(s.len())
}

// ── Search Service ──────────────────────────────────────────────────────

/// Search over the indexer's current snapshot.
pub struct SearchService {
    indexer: Arc<SkillIndexer>,
    settings: SearchConfig,
}

impl SearchService {
    /// Create a search service with default settings.
    pub fn new(indexer: Arc<SkillIndexer>) -> Self {
        Self::with_settings(indexer, SearchConfig::default())
    }

    pub fn with_settings(indexer: Arc<SkillIndexer>, settings: SearchConfig) -> Self {
        Self { indexer, settings }
    }

    /// Search skill metadata (names, descriptions, tags, triggers).
    pub fn search_metadata(&self, query: &str, limit: Option<usize>) -> SearchResponse<MetadataHit> {
        let snapshot = self.indexer.snapshot();
        let limit = limit.unwrap_or(self.settings.metadata_limit);
        let results = search_metadata(&snapshot, query, limit);

        debug!("Metadata search '{}' found {} results", query, results.len());
        SearchResponse::new(query, results)
    }

    /// Full-text search over skill bodies.
    pub fn search_content(&self, query: &str, limit: Option<usize>) -> SearchResponse<ContentHit> {
        let snapshot = self.indexer.snapshot();
        let limit = limit.unwrap_or(self.settings.content_limit);
        let results = search_content(&snapshot, query, limit, &self.settings);

        debug!("Content search '{}' found {} results", query, results.len());
        SearchResponse::new(query, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentIndex, ContentUnit, Document, SubUnit};
    use std::fs;
    use tempfile::TempDir;

    fn doc(name: &str, description: &str, tags: &[&str]) -> Document {
        Document {
            name: name.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            sub_units: Vec::new(),
        }
    }

    fn with_content(units: Vec<ContentUnit>) -> IndexSnapshot {
        let mut content = ContentIndex::new();
        for unit in units {
            content.insert(unit);
        }
        IndexSnapshot::new(Vec::new(), Vec::new(), content)
    }

    fn words(query: &str) -> Vec<&str> {
        query.split_whitespace().collect()
    }

    #[test]
    fn test_metadata_description_match() {
        let snapshot = IndexSnapshot::new(
            vec![doc("alpha", "writes CSV files", &["io"])],
            Vec::new(),
            ContentIndex::new(),
        );

        let results = search_metadata(&snapshot, "csv", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "alpha");
        assert_eq!(results[0].match_type, MatchType::Description);
        assert_eq!(results[0].score, 0.7);
    }

    #[test]
    fn test_metadata_field_priority() {
        let snapshot = IndexSnapshot::new(
            vec![
                doc("csv-tools", "writes csv", &["csv"]),
                doc("beta", "reads csv", &["csv"]),
                doc("gamma", "other", &["CSV-export"]),
            ],
            Vec::new(),
            ContentIndex::new(),
        );

        let results = search_metadata(&snapshot, "CSV", 10);
        let summary: Vec<_> = results
            .iter()
            .map(|r| (r.document.as_str(), r.match_type, r.score))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("csv-tools", MatchType::Name, 0.9),
                ("gamma", MatchType::Tags, 0.8),
                ("beta", MatchType::Description, 0.7),
            ]
        );
    }

    #[test]
    fn test_metadata_sub_units_score_independently() {
        let mut forms = doc("forms", "Form handling", &[]);
        forms.sub_units = vec![
            SubUnit {
                name: "react-forms".to_string(),
                file: "references/react.md".to_string(),
                triggers: vec![],
            },
            SubUnit {
                name: "hooks".to_string(),
                file: "references/hooks.md".to_string(),
                triggers: vec!["useForm".to_string()],
            },
        ];
        let snapshot = IndexSnapshot::new(vec![forms], Vec::new(), ContentIndex::new());

        let results = search_metadata(&snapshot, "form", 10);
        let summary: Vec<_> = results
            .iter()
            .map(|r| (r.sub_unit.as_deref(), r.match_type, r.score))
            .collect();
        assert_eq!(
            summary,
            vec![
                (None, MatchType::Name, 0.9),
                (Some("hooks"), MatchType::Triggers, 0.9),
                (Some("react-forms"), MatchType::Name, 0.85),
            ]
        );
    }

    #[test]
    fn test_metadata_ties_keep_discovery_order_and_limit() {
        let snapshot = IndexSnapshot::new(
            vec![
                doc("zeta", "shared topic", &[]),
                doc("alpha", "shared topic", &[]),
                doc("mid", "shared topic", &[]),
            ],
            Vec::new(),
            ContentIndex::new(),
        );

        let results = search_metadata(&snapshot, "shared", 2);
        let names: Vec<_> = results.iter().map(|r| r.document.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_metadata_blank_query() {
        let snapshot = IndexSnapshot::new(
            vec![doc("alpha", "anything", &[])],
            Vec::new(),
            ContentIndex::new(),
        );
        assert!(search_metadata(&snapshot, "   ", 5).is_empty());
    }

    #[test]
    fn test_metadata_matches_untrimmed_query() {
        let snapshot = IndexSnapshot::new(
            vec![doc("alpha", "writes CSV", &[])],
            Vec::new(),
            ContentIndex::new(),
        );
        assert!(search_metadata(&snapshot, "csv ", 5).is_empty());
        assert_eq!(search_metadata(&snapshot, "writes ", 5).len(), 1);
    }

    #[test]
    fn test_content_phrase_scores() {
        let body = "intro: the quick brown fox jumps over the lazy dog";
        assert_eq!(content_score(body, "brown fox", &words("brown fox"), 500), 1.2);

        let late = format!("{}the quick brown fox jumps", "x".repeat(600));
        assert_eq!(content_score(&late, "brown fox", &words("brown fox"), 500), 1.0);
    }

    #[test]
    fn test_content_intro_window_boundary() {
        let query = "brown fox";
        let fits = format!("{}{}", "x".repeat(500 - query.len()), query);
        assert_eq!(content_score(&fits, query, &words(query), 500), 1.2);

        let spills = format!("{}{}", "x".repeat(501 - query.len()), query);
        assert_eq!(content_score(&spills, query, &words(query), 500), 1.0);
    }

    #[test]
    fn test_content_all_words_frequency_bonus() {
        let body = "fox here and brown there";
        let score = content_score(body, "brown fox", &words("brown fox"), 500);
        assert!((score - 0.8).abs() < 1e-9);

        let busy = "fox fox fox fox fox brown brown";
        let score = content_score(busy, "brown fox", &words("brown fox"), 500);
        assert!((score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_content_some_words() {
        let body = "only the fox is here";
        let score = content_score(body, "brown fox", &words("brown fox"), 500);
        assert!((score - 0.15).abs() < 1e-9);
        assert_eq!(content_score(body, "zebra", &words("zebra"), 500), 0.0);
    }

    #[test]
    fn test_phrase_outranks_partial() {
        let query = "delta compression";
        let phrase = format!("{} uses delta compression", "x".repeat(600));
        let partial = "delta encoding without the other word";
        let all_words = "compression of each delta, compression again, delta again";

        let phrase_score = content_score(&phrase, query, &words(query), 500);
        assert!(phrase_score >= content_score(partial, query, &words(query), 500));
        assert!(phrase_score >= content_score(all_words, query, &words(query), 500));
    }

    #[test]
    fn test_search_content_scenario() {
        let snapshot = with_content(vec![
            ContentUnit::primary(
                "animals",
                "SKILL.md",
                "# Animals\n\nThe quick brown fox jumps over the lazy dog.",
            ),
            ContentUnit::primary("colors", "SKILL.md", "Brown is a color."),
            ContentUnit::primary("plants", "SKILL.md", "Trees and ferns."),
        ]);

        let results = search_content(&snapshot, "Brown Fox", 10, &SearchConfig::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document, "animals");
        assert_eq!(results[0].score, 1.2);
        assert!(results[0].snippet.contains("quick brown fox jumps"));
        assert_eq!(results[1].document, "colors");
        assert_eq!(results[1].score, 0.15);
    }

    #[test]
    fn test_search_content_rounds_and_limits() {
        let snapshot = with_content(vec![
            ContentUnit::primary("a", "SKILL.md", "one"),
            ContentUnit::primary("b", "SKILL.md", "one two"),
            ContentUnit::primary("c", "SKILL.md", "irrelevant"),
        ]);

        let results = search_content(&snapshot, "one two three", 1, &SearchConfig::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "b");
        assert_eq!(results[0].score, 0.2);

        let all = search_content(&snapshot, "one two three", 10, &SearchConfig::default());
        assert_eq!(all[1].score, 0.1);
    }

    #[test]
    fn test_search_content_blank_query() {
        let snapshot = with_content(vec![ContentUnit::primary("a", "SKILL.md", "text")]);
        assert!(search_content(&snapshot, "", 10, &SearchConfig::default()).is_empty());
    }

    #[test]
    fn test_content_trailing_space_is_not_a_phrase() {
        let snapshot = with_content(vec![ContentUnit::primary("a", "SKILL.md", "the fox.")]);

        let results = search_content(&snapshot, "fox ", 10, &SearchConfig::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.75);
        assert_eq!(results[0].snippet, "the fox.");

        assert!(search_content(&snapshot, "  ", 10, &SearchConfig::default()).is_empty());
    }

    #[test]
    fn test_snippet_window_in_middle() {
        let body = format!("{}needle{}", "a".repeat(100), "b".repeat(300));
        let snippet = extract_snippet(&body, "needle", 150, 50);

        let expected = format!("...{}needle{}...", "a".repeat(50), "b".repeat(144));
        assert_eq!(snippet, expected);
    }

    #[test]
    fn test_snippet_touching_boundaries() {
        let body = "needle in a short body";
        assert_eq!(extract_snippet(body, "needle", 150, 50), body);

        let body = format!("{}needle", "a".repeat(20));
        assert_eq!(extract_snippet(&body, "needle", 150, 50), body);

        let body = format!("needle{}", "b".repeat(200));
        let snippet = extract_snippet(&body, "needle", 150, 50);
        assert!(!snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_snippet_falls_back_to_word_then_start() {
        let body = format!("{}fox appears here{}", "a".repeat(80), "b".repeat(200));
        let snippet = extract_snippet(&body, "brown fox", 20, 10);
        assert_eq!(
            snippet,
            format!("...{}fox appears herebbbb...", "a".repeat(10))
        );

        let snippet = extract_snippet("nothing relevant at all", "zebra", 7, 50);
        assert_eq!(snippet, "nothing...");

        assert_eq!(extract_snippet("tiny", "zebra", 150, 50), "tiny");
    }

    #[test]
    fn test_snippet_collapses_newlines_and_respects_char_boundaries() {
        let body = "línea uno\nlínea dos ñandú\nfin";
        let snippet = extract_snippet(body, "ñandú", 3, 4);
        assert_eq!(snippet, "...dos ñan...");

        let snippet = extract_snippet(body, "dos", 150, 50);
        assert_eq!(snippet, "línea uno línea dos ñandú fin");
    }

    #[test]
    fn test_service_search() {
        let temp_dir = TempDir::new().unwrap();
        let skill_dir = temp_dir.path().join("testing");
        fs::create_dir_all(&skill_dir).unwrap();
        fs::write(
            skill_dir.join("_meta.json"),
            r#"{"name": "testing", "description": "Testing patterns", "tags": ["pytest"]}"#,
        )
        .unwrap();
        fs::write(
            skill_dir.join("SKILL.md"),
            "# Testing\n\nUse pytest for unit tests and integration tests.",
        )
        .unwrap();

        let indexer = Arc::new(SkillIndexer::new(temp_dir.path()));
        indexer.reload().unwrap();
        let service = SearchService::new(indexer);

        let meta = service.search_metadata("pytest", None);
        assert_eq!(meta.query, "pytest");
        assert_eq!(meta.top().unwrap().match_type, MatchType::Tags);

        let content = service.search_content("pytest", None);
        let top = content.top().unwrap();
        assert_eq!(top.document, "testing");
        assert_eq!(top.file, "SKILL.md");
        assert!(top.sub_unit.is_none());
        assert!(top.snippet.contains("use pytest for unit tests"));
    }
}
