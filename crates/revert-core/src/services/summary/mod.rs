mod entities;

pub use entities::{
    extract_entities, scan_entities, CodeEntity, ContentAnalyzer, EntityKind, EntityScan,
};
#[cfg(test)]
pub use entities::MockContentAnalyzer;

use crate::services::diff::{compute_line_diff, DiffOp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_LARGE_CHANGE_THRESHOLD: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub summary: String,
    pub added_lines: Vec<String>,
    pub removed_lines: Vec<String>,
    pub formatted_diff: String,
}

/// 差分から人間向けの要約を生成する
#[derive(Debug, Clone)]
pub struct ChangeSummarizer {
    large_change_threshold: usize,
    analyzer: Option<Arc<dyn ContentAnalyzer>>,
}

impl Default for ChangeSummarizer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ChangeSummarizer {
    pub fn new(large_change_threshold: Option<usize>) -> Self {
        Self {
            large_change_threshold: large_change_threshold
                .unwrap_or(DEFAULT_LARGE_CHANGE_THRESHOLD),
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn large_change_threshold(&self) -> usize {
        self.large_change_threshold
    }

    pub fn generate_change_summary(&self, old: &str, new: &str, file_path: &str) -> ChangeSummary {
        let mut added_lines = Vec::new();
        let mut removed_lines = Vec::new();
        let mut added_text = String::new();
        let mut removed_text = String::new();
        let mut formatted_diff = String::new();

        for op in compute_line_diff(old, new) {
            let (prefix, lines, text) = match &op {
                DiffOp::Equal(_) => continue,
                DiffOp::Insert(_) => ('+', &mut added_lines, &mut added_text),
                DiffOp::Delete(_) => ('-', &mut removed_lines, &mut removed_text),
            };
            text.push_str(op.text());
            for line in op.text().lines() {
                formatted_diff.push(prefix);
                formatted_diff.push_str(line);
                formatted_diff.push('\n');
                lines.push(line.to_string());
            }
        }

        let counts = format!(
            "(Added {} lines, Removed {} lines)",
            added_lines.len(),
            removed_lines.len()
        );

        let summary = if added_lines.len() + removed_lines.len() > self.large_change_threshold {
            tracing::debug!(
                "{}: skipping entity analysis for a change of {} lines",
                file_path,
                added_lines.len() + removed_lines.len()
            );
            format!("{}: major changes detected {}", file_path, counts)
        } else {
            let description = self
                .describe_entities(&added_text, &removed_text)
                .unwrap_or_else(|| {
                    generic_description(added_lines.len(), removed_lines.len()).to_string()
                });
            format!("{}: {} {}", file_path, description, counts)
        };

        ChangeSummary {
            summary,
            added_lines,
            removed_lines,
            formatted_diff: formatted_diff.trim_end_matches('\n').to_string(),
        }
    }

    fn describe_entities(&self, added_text: &str, removed_text: &str) -> Option<String> {
        let analyzer = self.analyzer.as_deref();
        let added = extract_entities(added_text, analyzer);
        let removed = extract_entities(removed_text, analyzer);

        let mut clauses = Vec::new();
        for entity in &added.entities {
            if removed.entities.contains(entity) {
                clauses.push(format!("modified {} `{}`", entity.kind, entity.name));
            }
        }
        for entity in &added.entities {
            if !removed.entities.contains(entity) {
                clauses.push(format!("added {} `{}`", entity.kind, entity.name));
            }
        }
        for entity in &removed.entities {
            if !added.entities.contains(entity) {
                clauses.push(format!("removed {} `{}`", entity.kind, entity.name));
            }
        }

        for (verb, scan) in [("added", &added), ("removed", &removed)] {
            if scan.imports > 0 {
                clauses.push(format!("{} {}", verb, plural(scan.imports, "import statement")));
            }
            if scan.exports > 0 {
                clauses.push(format!("{} {}", verb, plural(scan.exports, "export statement")));
            }
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(", "))
        }
    }
}

fn generic_description(added: usize, removed: usize) -> &'static str {
    match (added, removed) {
        (0, 0) => "no changes",
        (_, 0) => "added new content",
        (0, _) => "removed content",
        _ => "modified existing content",
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(prefix: &str, count: usize) -> String {
        (0..count).map(|i| format!("{} line {}\n", prefix, i)).collect()
    }

    #[test]
    fn test_added_and_removed_lines() {
        let summarizer = ChangeSummarizer::default();
        let result = summarizer.generate_change_summary(
            "a\nold\nc\n",
            "a\nnew\nextra\nc\n",
            "notes.txt",
        );
        assert_eq!(result.added_lines, vec!["new", "extra"]);
        assert_eq!(result.removed_lines, vec!["old"]);
        assert_eq!(result.formatted_diff, "-old\n+new\n+extra");
        assert_eq!(
            result.summary,
            "notes.txt: modified existing content (Added 2 lines, Removed 1 lines)"
        );
    }

    #[test]
    fn test_generic_descriptions() {
        let summarizer = ChangeSummarizer::default();
        assert_eq!(
            summarizer.generate_change_summary("", "hello\n", "a.txt").summary,
            "a.txt: added new content (Added 1 lines, Removed 0 lines)"
        );
        assert_eq!(
            summarizer.generate_change_summary("bye\n", "", "a.txt").summary,
            "a.txt: removed content (Added 0 lines, Removed 1 lines)"
        );
        assert_eq!(
            summarizer.generate_change_summary("same\n", "same\n", "a.txt").summary,
            "a.txt: no changes (Added 0 lines, Removed 0 lines)"
        );
    }

    #[test]
    fn test_entity_classification() {
        let old = "function foo() {\n  return 1;\n}\nclass Old {}\n";
        let new = "function foo() {\n  return 2;\n}\nclass Bar {}\nimport x from 'x';\n";
        let summarizer = ChangeSummarizer::default();
        let result = summarizer.generate_change_summary(old, new, "src/a.ts");
        assert_eq!(
            result.summary,
            "src/a.ts: added class `Bar`, removed class `Old`, added 1 import statement (Added 3 lines, Removed 2 lines)"
        );
    }

    #[test]
    fn test_same_entity_on_both_sides_is_modified() {
        let old = "export function load(path) {\n  return read(path);\n}\n";
        let new = "export function load(path, opts) {\n  return read(path, opts);\n}\n";
        let summarizer = ChangeSummarizer::default();
        let result = summarizer.generate_change_summary(old, new, "load.ts");
        assert!(
            result.summary.starts_with("load.ts: modified function `load`"),
            "unexpected summary: {}",
            result.summary
        );
    }

    #[test]
    fn test_major_change_short_circuits() {
        let old = format!("function alpha() {{}}\n{}", numbered("old", 250));
        let new = format!("function beta() {{}}\n{}", numbered("new", 250));
        let summarizer = ChangeSummarizer::default();
        let result = summarizer.generate_change_summary(&old, &new, "big.ts");
        assert_eq!(
            result.summary,
            "big.ts: major changes detected (Added 251 lines, Removed 251 lines)"
        );
        assert_eq!(result.added_lines.len() + result.removed_lines.len(), 502);
    }

    #[test]
    fn test_just_below_threshold_keeps_entities() {
        let old = format!(
            "function alpha() {{}}\nfunction beta() {{}}\n{}",
            numbered("old", 248)
        );
        let new = format!(
            "function gamma() {{}}\nfunction delta() {{}}\n{}",
            numbered("new", 247)
        );
        let summarizer = ChangeSummarizer::default();
        let result = summarizer.generate_change_summary(&old, &new, "fns.ts");
        assert_eq!(result.added_lines.len() + result.removed_lines.len(), 499);
        assert_eq!(
            result.summary,
            "fns.ts: added function `gamma`, added function `delta`, removed function `alpha`, removed function `beta` (Added 249 lines, Removed 250 lines)"
        );
    }

    #[test]
    fn test_threshold_boundary() {
        let old = format!("function alpha() {{}}\n{}", numbered("old", 249));
        let summarizer = ChangeSummarizer::default();

        let at_limit = format!("function gamma() {{}}\n{}", numbered("new", 249));
        let result = summarizer.generate_change_summary(&old, &at_limit, "edge.ts");
        assert_eq!(result.added_lines.len() + result.removed_lines.len(), 500);
        assert_eq!(
            result.summary,
            "edge.ts: added function `gamma`, removed function `alpha` (Added 250 lines, Removed 250 lines)"
        );

        let over_limit = format!("function gamma() {{}}\n{}", numbered("new", 250));
        let result = summarizer.generate_change_summary(&old, &over_limit, "edge.ts");
        assert_eq!(result.added_lines.len() + result.removed_lines.len(), 501);
        assert_eq!(
            result.summary,
            "edge.ts: major changes detected (Added 251 lines, Removed 250 lines)"
        );
    }

    #[test]
    fn test_formatted_diff_keeps_trailing_whitespace_of_last_line() {
        let summarizer = ChangeSummarizer::default();
        let result = summarizer.generate_change_summary("a\n", "a\n  \n", "pad.txt");
        assert_eq!(result.added_lines, vec!["  "]);
        assert_eq!(result.formatted_diff, "+  ");
    }

    #[test]
    fn test_custom_threshold() {
        let summarizer = ChangeSummarizer::new(Some(2));
        let result = summarizer.generate_change_summary("a\nb\n", "c\nd\n", "x.txt");
        assert!(result.summary.contains("major changes detected"));
    }
}
