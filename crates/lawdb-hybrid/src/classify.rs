//! Query classification.
//!
//! Each rule is a regex with a fixed weight; a rule adds its weight once when
//! it matches anywhere in the query. The totals pick the fusion weights.

use regex::Regex;
use serde::Serialize;

use lawdb_core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClass {
    /// Citation-like queries; favour lexical matches.
    Exact,
    /// Conceptual questions; favour embeddings.
    Semantic,
    Mixed,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub weight: u32,
}

pub const EXACT_RULES: &[Rule] = &[
    Rule {
        name: "article_citation",
        pattern: r"第[0-9零〇一二三四五六七八九十百千万两]+[条章节款项编]|(?i:\barticle\s+\d+)",
        weight: 3,
    },
    Rule { name: "law_title", pattern: r"《[^《》]+》", weight: 3 },
    Rule { name: "law_suffix", pattern: r"\p{Han}(?:法典|法|条例|规定)", weight: 1 },
    Rule { name: "arabic_numeral", pattern: r"[0-9]", weight: 1 },
    Rule { name: "quoted_phrase", pattern: r#""[^"]+"|“[^”]+”|「[^」]+」"#, weight: 2 },
];

pub const SEMANTIC_RULES: &[Rule] = &[
    Rule { name: "definition", pattern: r"(?i:\bwhat\s+is\b)|什么是|是什么|含义|定义", weight: 2 },
    Rule { name: "procedure", pattern: r"(?i:\bhow\b)|如何|怎么|怎样", weight: 2 },
    Rule { name: "reason", pattern: r"(?i:\bwhy\b)|为什么|为何", weight: 2 },
    Rule {
        name: "comparison",
        pattern: r"(?i:\b(?:difference|compare|vs)\b)|区别|不同|比较|相比",
        weight: 2,
    },
    Rule { name: "permission", pattern: r"(?i:\bcan\b)|能否|可以|是否", weight: 1 },
    Rule { name: "question_mark", pattern: r"[?？]\s*$", weight: 1 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub class: QueryClass,
    pub exact_score: u32,
    pub semantic_score: u32,
}

struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

fn compile(rules: &[Rule]) -> Result<Vec<CompiledRule>> {
    rules
        .iter()
        .map(|rule| {
            Regex::new(rule.pattern)
                .map(|regex| CompiledRule { rule: *rule, regex })
                .map_err(|e| Error::InvalidConfig(format!("classifier rule {}: {e}", rule.name)))
        })
        .collect()
}

pub struct QueryClassifier {
    exact: Vec<CompiledRule>,
    semantic: Vec<CompiledRule>,
}

impl QueryClassifier {
    pub fn new() -> Result<Self> { Self::with_rules(EXACT_RULES, SEMANTIC_RULES) }

    pub fn with_rules(exact: &[Rule], semantic: &[Rule]) -> Result<Self> {
        Ok(Self { exact: compile(exact)?, semantic: compile(semantic)? })
    }

    /// Names of the rules that fire, exact rules first.
    pub fn matched_rules(&self, query: &str) -> Vec<&'static str> {
        self.exact
            .iter()
            .chain(&self.semantic)
            .filter(|r| r.regex.is_match(query))
            .map(|r| r.rule.name)
            .collect()
    }

    pub fn classify(&self, query: &str) -> Classification {
        let exact_score = score(&self.exact, query);
        let semantic_score = score(&self.semantic, query);
        let class = if exact_score >= 3 && exact_score > semantic_score {
            QueryClass::Exact
        } else if semantic_score >= 2 && semantic_score > exact_score {
            QueryClass::Semantic
        } else {
            QueryClass::Mixed
        };
        Classification { class, exact_score, semantic_score }
    }
}

fn score(rules: &[CompiledRule], query: &str) -> u32 {
    rules.iter().filter(|r| r.regex.is_match(query)).map(|r| r.rule.weight).sum()
}
