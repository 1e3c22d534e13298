use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Class,
    Variable,
    Type,
    Enum,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Function => write!(f, "function"),
            EntityKind::Class => write!(f, "class"),
            EntityKind::Variable => write!(f, "variable"),
            EntityKind::Type => write!(f, "type"),
            EntityKind::Enum => write!(f, "enum"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeEntity {
    pub kind: EntityKind,
    pub name: String,
}

impl CodeEntity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// 追加・削除されたテキストから名前付きエンティティを抽出する外部アナライザ
#[cfg_attr(test, mockall::automock)]
pub trait ContentAnalyzer: Debug + Send + Sync {
    fn analyze(&self, text: &str) -> Result<Vec<CodeEntity>>;
}

/// Entities plus statement counts found in one block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityScan {
    pub entities: Vec<CodeEntity>,
    pub imports: usize,
    pub exports: usize,
}

lazy_static! {
    // 先にマッチしたものを採用するため、関数パターンを変数より前に置く
    static ref ENTITY_PATTERNS: Vec<(EntityKind, Regex)> = vec![
        (
            EntityKind::Function,
            Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*[(<]").unwrap(),
        ),
        (
            EntityKind::Function,
            Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)").unwrap(),
        ),
        (
            EntityKind::Function,
            Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_]\w*)").unwrap(),
        ),
        (
            EntityKind::Function,
            Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap(),
        ),
        (
            EntityKind::Class,
            Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap(),
        ),
        (
            EntityKind::Class,
            Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_]\w*)").unwrap(),
        ),
        (
            EntityKind::Type,
            Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?(?:interface|type)\s+([A-Za-z_$][\w$]*)").unwrap(),
        ),
        (
            EntityKind::Type,
            Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(?:trait|type)\s+([A-Za-z_]\w*)").unwrap(),
        ),
        (
            EntityKind::Enum,
            Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)").unwrap(),
        ),
        (
            EntityKind::Enum,
            Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_]\w*)").unwrap(),
        ),
        (
            EntityKind::Variable,
            Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)").unwrap(),
        ),
        (
            EntityKind::Variable,
            Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:static|const)\s+(?:mut\s+)?([A-Z_][A-Z0-9_]*)\s*:").unwrap(),
        ),
    ];
    static ref IMPORT_PATTERN: Regex =
        Regex::new(r"^\s*(?:import\s|import\{|from\s+\S+\s+import\s|use\s+[\w:{]|#include\s)").unwrap();
    static ref EXPORT_PATTERN: Regex = Regex::new(r"^\s*(?:export\s|export\{|pub\s+use\s)").unwrap();
}

fn entity_in_line(line: &str) -> Option<CodeEntity> {
    ENTITY_PATTERNS.iter().find_map(|(kind, pattern)| {
        pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|name| CodeEntity::new(*kind, name.as_str()))
    })
}

/// Line-oriented structural matcher used when no analyzer is configured.
pub fn scan_entities(text: &str) -> EntityScan {
    let mut scan = EntityScan::default();
    for line in text.lines() {
        if IMPORT_PATTERN.is_match(line) {
            scan.imports += 1;
        } else if EXPORT_PATTERN.is_match(line) && entity_in_line(line).is_none() {
            scan.exports += 1;
        }
        if let Some(entity) = entity_in_line(line) {
            if !scan.entities.contains(&entity) {
                scan.entities.push(entity);
            }
        }
    }
    scan
}

/// Named entities only; import/export counts always come from the heuristic.
pub fn extract_entities(text: &str, analyzer: Option<&dyn ContentAnalyzer>) -> EntityScan {
    let mut scan = scan_entities(text);
    if let Some(analyzer) = analyzer {
        match analyzer.analyze(text) {
            Ok(mut entities) => {
                let mut seen = Vec::with_capacity(entities.len());
                entities.retain(|entity| {
                    let fresh = !seen.contains(entity);
                    if fresh {
                        seen.push(entity.clone());
                    }
                    fresh
                });
                scan.entities = entities;
            }
            Err(e) => {
                tracing::warn!("content analyzer failed, using built-in patterns: {}", e);
            }
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_patterns() {
        let test_cases = vec![
            ("function foo() {", Some(CodeEntity::new(EntityKind::Function, "foo"))),
            ("export async function fetchAll<T>(url) {", Some(CodeEntity::new(EntityKind::Function, "fetchAll"))),
            ("const handler = async (req, res) => {", Some(CodeEntity::new(EntityKind::Function, "handler"))),
            ("pub async fn revert_changes(&self) {", Some(CodeEntity::new(EntityKind::Function, "revert_changes"))),
            ("    def process(self, item):", Some(CodeEntity::new(EntityKind::Function, "process"))),
            ("export class Bar extends Base {", Some(CodeEntity::new(EntityKind::Class, "Bar"))),
            ("pub struct ChangeSet {", Some(CodeEntity::new(EntityKind::Class, "ChangeSet"))),
            ("export interface Options {", Some(CodeEntity::new(EntityKind::Type, "Options"))),
            ("type Alias = string | number;", Some(CodeEntity::new(EntityKind::Type, "Alias"))),
            ("pub trait FileSystem {", Some(CodeEntity::new(EntityKind::Type, "FileSystem"))),
            ("export enum Color {", Some(CodeEntity::new(EntityKind::Enum, "Color"))),
            ("pub enum ChangeType {", Some(CodeEntity::new(EntityKind::Enum, "ChangeType"))),
            ("let counter = 0;", Some(CodeEntity::new(EntityKind::Variable, "counter"))),
            ("const MAX_SIZE: usize = 10;", Some(CodeEntity::new(EntityKind::Variable, "MAX_SIZE"))),
            ("    return value + 1;", None),
            ("// function commented() {}", None),
        ];

        for (input, expected) in test_cases {
            assert_eq!(entity_in_line(input), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_scan_counts_imports_and_exports() {
        let text = "import a from 'a';\nimport { b } from 'b';\nuse std::fmt;\nexport { a, b };\nexport function c() {}\n";
        let scan = scan_entities(text);
        assert_eq!(scan.imports, 3);
        assert_eq!(scan.exports, 1);
        assert_eq!(scan.entities, vec![CodeEntity::new(EntityKind::Function, "c")]);
    }

    #[test]
    fn test_analyzer_replaces_named_entities() {
        let mut analyzer = MockContentAnalyzer::new();
        analyzer
            .expect_analyze()
            .returning(|_| Ok(vec![CodeEntity::new(EntityKind::Class, "Widget")]));

        let scan = extract_entities("import x from 'x';\nfunction foo() {}\n", Some(&analyzer as &dyn ContentAnalyzer));
        assert_eq!(scan.entities, vec![CodeEntity::new(EntityKind::Class, "Widget")]);
        assert_eq!(scan.imports, 1);
    }

    #[test]
    fn test_failing_analyzer_falls_back_to_patterns() {
        let mut analyzer = MockContentAnalyzer::new();
        analyzer
            .expect_analyze()
            .returning(|_| Err(anyhow::anyhow!("parser unavailable")));

        let scan = extract_entities("function foo() {}\n", Some(&analyzer as &dyn ContentAnalyzer));
        assert_eq!(scan.entities, vec![CodeEntity::new(EntityKind::Function, "foo")]);
    }
}
