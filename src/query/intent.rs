//! Rule-based intent classification

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// What a free-text query is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    FindFunction,
    FindClass,
    FindInterface,
    FindDependencies,
    FindUsage,
    FindRelated,
    AnalyzePath,
    ExplainConcept,
    FindGeneral,
    Unknown,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FindFunction => "find_function",
            Self::FindClass => "find_class",
            Self::FindInterface => "find_interface",
            Self::FindDependencies => "find_dependencies",
            Self::FindUsage => "find_usage",
            Self::FindRelated => "find_related",
            Self::AnalyzePath => "analyze_path",
            Self::ExplainConcept => "explain_concept",
            Self::FindGeneral => "find_general",
            Self::Unknown => "unknown",
        }
    }

    /// Confidence before the entity bonus
    pub fn base_confidence(&self) -> f64 {
        match self {
            Self::FindFunction | Self::FindClass | Self::FindInterface => 0.8,
            Self::FindDependencies | Self::FindUsage => 0.75,
            Self::FindRelated | Self::AnalyzePath => 0.7,
            Self::ExplainConcept => 0.6,
            Self::FindGeneral => 0.5,
            Self::Unknown => 0.3,
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered pattern table. The first intent with a matching pattern wins.
static INTENT_PATTERNS: LazyLock<Vec<(QueryIntent, Vec<Regex>)>> = LazyLock::new(|| {
    let table: &[(QueryIntent, &[&str])] = &[
        (
            QueryIntent::FindFunction,
            &[r"\bfunctions?\b", r"\bmethods?\b", r"\bfunc\b", r"\bfn\b", r"\bhandlers?\b"],
        ),
        (QueryIntent::FindClass, &[r"\bclass(es)?\b", r"\bcomponents?\b"]),
        (
            QueryIntent::FindInterface,
            &[r"\binterfaces?\b", r"\btypes?\b", r"\bcontracts?\b"],
        ),
        (
            QueryIntent::FindDependencies,
            &[
                r"\bdepend(s|encies|ency|ing)?\b",
                r"\bimports?\b",
                r"\brequires?\b",
                r"\bwhat does .+ (use|call|need)\b",
            ],
        ),
        (
            QueryIntent::FindUsage,
            &[
                r"\busages?\b",
                r"\bused\b",
                r"\bcallers?\b",
                r"\bwho (calls|uses)\b",
                r"\bwhat (calls|uses)\b",
                r"\breferences? to\b",
            ],
        ),
        (
            QueryIntent::FindRelated,
            &[r"\brelated\b", r"\bconnected\b", r"\bassociated\b", r"\bsimilar\b", r"\bneighbou?rs?\b"],
        ),
        (
            QueryIntent::AnalyzePath,
            &[
                r"\bpath\b",
                r"\bflows?\b",
                r"\bbetween\b.+\band\b",
                r"\bfrom\b.+\bto\b",
                r"\bhow does .+ reach\b",
            ],
        ),
        (
            QueryIntent::ExplainConcept,
            &[
                r"\bexplain\b",
                r"\bdescribe\b",
                r"\bwhat (is|are)\b",
                r"\bhow (does|do|is)\b",
                r"\bwhy\b",
            ],
        ),
        (
            QueryIntent::FindGeneral,
            &[r"\bfind\b", r"\bshow\b", r"\blist\b", r"\bsearch\b", r"\bwhere\b", r"\bget\b"],
        ),
    ];

    table
        .iter()
        .map(|(intent, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::error!("Invalid intent pattern {}: {}", p, e);
                        None
                    }
                })
                .collect();
            (*intent, compiled)
        })
        .collect()
});

/// Classify a query; `Unknown` when nothing matches
pub fn classify(text: &str) -> QueryIntent {
    INTENT_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
        .map(|(intent, _)| *intent)
        .unwrap_or(QueryIntent::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_intents() {
        assert_eq!(classify("find function createLogger"), QueryIntent::FindFunction);
        assert_eq!(classify("Show me the UserService class"), QueryIntent::FindClass);
        assert_eq!(classify("interface Config"), QueryIntent::FindInterface);
    }

    #[test]
    fn test_relational_intents() {
        assert_eq!(classify("what depends on module express"), QueryIntent::FindDependencies);
        assert_eq!(classify("who calls parseArgs"), QueryIntent::FindUsage);
        assert_eq!(classify("where is Logger used"), QueryIntent::FindUsage);
        assert_eq!(classify("things related to auth"), QueryIntent::FindRelated);
        assert_eq!(classify("path from main to saveUser"), QueryIntent::AnalyzePath);
    }

    #[test]
    fn test_earlier_intents_win() {
        // Declaration kinds are checked before relational cues
        assert_eq!(classify("who calls the function parseArgs"), QueryIntent::FindFunction);
        assert_eq!(classify("which class depends on express"), QueryIntent::FindClass);
        assert_eq!(classify("what imports the logger used by main"), QueryIntent::FindDependencies);
        assert_eq!(classify("callers related to auth"), QueryIntent::FindUsage);
        assert_eq!(classify("explain the path from a to b"), QueryIntent::AnalyzePath);
    }

    #[test]
    fn test_fallback_intents() {
        assert_eq!(classify("explain caching"), QueryIntent::ExplainConcept);
        assert_eq!(classify("search auth"), QueryIntent::FindGeneral);
        assert_eq!(classify("createLogger"), QueryIntent::Unknown);
        assert_eq!(classify(""), QueryIntent::Unknown);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(classify("FIND FUNCTION X"), QueryIntent::FindFunction);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_value(QueryIntent::FindFunction).unwrap(),
            "find_function"
        );
        assert_eq!(QueryIntent::AnalyzePath.to_string(), "analyze_path");
    }
}
