//! Free-text query engine
//!
//! Classifies the text, extracts entities, renders one parameterized
//! template, runs it with a single store call and explains the result.

use super::entities::extract_entities;
use super::intent::{classify, QueryIntent};
use super::models::{QueryConfig, QueryContext, QueryResponse};
use super::templates::{build_query, QueryShape};
use crate::error::Result;
use crate::neo4j::models::QueryResult;
use crate::neo4j::GraphStore;
use std::sync::Arc;
use std::time::Instant;

/// Confidence bonus per extracted entity, and its cap
const ENTITY_BONUS: f64 = 0.05;
const MAX_ENTITY_BONUS: f64 = 0.15;

/// Confidence in the interpretation of a query
pub fn confidence(intent: QueryIntent, entity_count: usize) -> f64 {
    let bonus = (entity_count as f64 * ENTITY_BONUS).min(MAX_ENTITY_BONUS);
    (intent.base_confidence() + bonus).clamp(0.0, 1.0)
}

pub struct QueryEngine {
    store: Arc<dyn GraphStore>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Classify `text` without running anything
    pub fn analyze(&self, text: &str, limit: Option<usize>) -> QueryContext {
        let result_limit = limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1));
        QueryContext {
            raw_query: text.trim().to_string(),
            intent: classify(text),
            entities: extract_entities(text),
            result_limit,
        }
    }

    /// Answer a free-text query. Store failures propagate as
    /// `QueryExecution` errors carrying the rendered query.
    pub async fn query(&self, text: &str, limit: Option<usize>) -> Result<QueryResponse> {
        let started = Instant::now();
        let ctx = self.analyze(text, limit);
        let graph_query = build_query(&ctx);

        tracing::debug!(
            intent = %ctx.intent,
            entities = ?ctx.entities,
            shape = graph_query.shape.as_str(),
            "Running query"
        );

        let result = self
            .store
            .query(&graph_query.cypher, &graph_query.params)
            .await?;

        let explanation = explain(&ctx, graph_query.shape, &result);
        let suggestions = suggest(&ctx, &result);

        Ok(QueryResponse {
            success: true,
            intent: ctx.intent,
            confidence: confidence(ctx.intent, ctx.entities.len()),
            entities: ctx.entities,
            nodes: result.nodes,
            relationships: result.relationships,
            explanation,
            suggestions,
            cypher: graph_query.cypher,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn subject(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::FindFunction => "functions",
        QueryIntent::FindClass => "classes",
        QueryIntent::FindInterface => "interfaces and type aliases",
        QueryIntent::FindDependencies => "dependencies",
        QueryIntent::FindUsage => "usages",
        QueryIntent::FindRelated => "related entities",
        QueryIntent::AnalyzePath => "connections",
        QueryIntent::ExplainConcept => "entities describing the concept",
        QueryIntent::FindGeneral | QueryIntent::Unknown => "entities",
    }
}

fn quoted_list(entities: &[String]) -> String {
    entities
        .iter()
        .map(|e| format!("'{}'", e))
        .collect::<Vec<_>>()
        .join(", ")
}

fn explain(ctx: &QueryContext, shape: QueryShape, result: &QueryResult) -> String {
    let target = if ctx.entities.is_empty() {
        String::new()
    } else if shape == QueryShape::Path {
        format!(" between '{}' and '{}'", ctx.entities[0], ctx.entities[1])
    } else {
        format!(" matching {}", quoted_list(&ctx.entities))
    };

    let found = match (result.nodes.len(), result.relationships.len()) {
        (0, 0) => "nothing was found".to_string(),
        (nodes, 0) => format!("found {} node(s)", nodes),
        (nodes, rels) => format!("found {} node(s) and {} relationship(s)", nodes, rels),
    };

    format!(
        "Interpreted as {} ({}): looked for {}{}; {}.",
        ctx.intent,
        subject(ctx.intent),
        subject(ctx.intent),
        target,
        found
    )
}

fn suggest(ctx: &QueryContext, result: &QueryResult) -> Vec<String> {
    let mut suggestions = Vec::new();

    if result.is_empty() {
        if ctx.entities.is_empty() {
            suggestions.push("Name the entity you are looking for, e.g. \"find function createLogger\"".to_string());
        } else {
            suggestions.push("Broaden the search with a shorter or partial name".to_string());
            suggestions.push(format!("Check the spelling of {}", quoted_list(&ctx.entities)));
        }
        suggestions.push("Run a sync if the code changed since the graph was last updated".to_string());
        return suggestions;
    }

    let first = ctx
        .entities
        .first()
        .cloned()
        .or_else(|| result.nodes.first().map(|n| n.name.clone()));

    if let Some(name) = first {
        match ctx.intent {
            QueryIntent::FindFunction | QueryIntent::FindClass | QueryIntent::FindInterface => {
                suggestions.push(format!("who uses {}", name));
                suggestions.push(format!("what does {} depend on", name));
            }
            QueryIntent::FindDependencies => {
                suggestions.push(format!("who uses {}", name));
            }
            QueryIntent::FindUsage => {
                suggestions.push(format!("what does {} depend on", name));
                suggestions.push(format!("things related to {}", name));
            }
            QueryIntent::FindRelated | QueryIntent::AnalyzePath => {
                suggestions.push(format!("explain {}", name));
            }
            QueryIntent::ExplainConcept | QueryIntent::FindGeneral | QueryIntent::Unknown => {
                suggestions.push(format!("things related to {}", name));
            }
        }
    }

    if ctx.intent == QueryIntent::Unknown {
        suggestions.push("Start the query with what you want, e.g. \"find class\" or \"who calls\"".to_string());
    }

    if result.rows >= ctx.result_limit {
        suggestions.push(format!(
            "Results were capped at {}; raise the limit or narrow the query",
            ctx.result_limit
        ));
    }

    suggestions
}
