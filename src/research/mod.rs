//! Research stage: topic analysis, web search, structured brief extraction

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backon::Retryable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::llm::{CompletionClient, Message};
use crate::search::{RetryPolicy, SearchProvider, SearchResult};

const ANALYZE_SYSTEM_PROMPT: &str = "You are a research assistant. Given a topic, analyze it and:
1. Identify key aspects to research
2. Generate 3-5 specific research questions
3. Suggest relevant subtopics
4. Determine the target audience

Return your analysis in a structured format.";

const BRIEF_SYSTEM_PROMPT: &str = r#"You are a research analyst. From the provided text, extract the following information relevant to the research angle. Structure your output as a JSON object with the specified keys and formats.

- key_statistics: A list of 5-7 strings. Each string should state a verifiable statistic and include its source inline, e.g., "80% of companies use AI for automation (McKinsey, 2023)".
- expert_quotes: A list of 3-5 strings. Each string should be a quote with attribution, e.g., "\"AI will transform every industry.\" — Sundar Pichai, Google CEO".
- case_studies: A list of 2-3 strings. Each string should briefly describe a named company or project and its relevance.
- key_definitions: A dictionary where each key is an important term and each value is its definition.
- counter_arguments: A list of strings, each describing a common counter-argument or alternative viewpoint.

Ensure all extracted data is directly relevant to the research angle.
Return ONLY the JSON object, no additional text."#;

/// A brief entry as the model returns it: either a plain string or an object
/// keyed by a section-specific field. Both shapes are valid upstream output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BriefItem {
    Text(String),
    Record(serde_json::Map<String, Value>),
}

impl BriefItem {
    /// Render for prompt embedding; object items prefer `key`, anything else
    /// falls back to the compact JSON form.
    pub fn render(&self, key: &str) -> String {
        match self {
            BriefItem::Text(text) => text.clone(),
            BriefItem::Record(map) => match map.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map.clone()).to_string(),
            },
        }
    }
}

/// Structured research distillate
///
/// All content fields are always present, even when the upstream JSON was
/// malformed; callers never branch on key existence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchBrief {
    pub key_statistics: Vec<BriefItem>,
    pub expert_quotes: Vec<BriefItem>,
    pub case_studies: Vec<BriefItem>,
    pub key_definitions: BTreeMap<String, String>,
    pub counter_arguments: Vec<String>,
    pub raw_sources: Vec<SearchResult>,
}

impl ResearchBrief {
    /// Canonical empty brief, optionally carrying the ground-truth sources
    pub fn empty(raw_sources: Vec<SearchResult>) -> Self {
        Self {
            raw_sources,
            ..Default::default()
        }
    }

    /// True when no content section has entries
    pub fn has_no_content(&self) -> bool {
        self.key_statistics.is_empty()
            && self.expert_quotes.is_empty()
            && self.case_studies.is_empty()
            && self.key_definitions.is_empty()
            && self.counter_arguments.is_empty()
    }
}

/// Everything the research stage hands to the writer
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub topic: String,
    pub analysis: String,
    pub search_results: Vec<SearchResult>,
    pub research_brief: ResearchBrief,
    pub sources_count: usize,
}

/// Agent responsible for researching topics and gathering information
pub struct ResearchAgent {
    llm: Arc<dyn CompletionClient>,
    search: Arc<dyn SearchProvider>,
    max_sources: usize,
    retry: RetryPolicy,
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        search: Arc<dyn SearchProvider>,
        max_sources: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            search,
            max_sources,
            retry,
        }
    }

    /// Analyze a topic and surface research angles as free text
    ///
    /// The answer is content, not a parse target; failures propagate.
    pub async fn analyze_topic(&self, topic: &str) -> Result<String> {
        info!("Analyzing topic: {topic}");
        let messages = [
            Message::system(ANALYZE_SYSTEM_PROMPT),
            Message::user(format!("Topic: {topic}")),
        ];
        self.llm.chat(&messages).await
    }

    /// Search the web, retrying on failure, degrading to zero sources
    pub async fn search_web(&self, query: &str) -> Vec<SearchResult> {
        info!("Searching web for: {query}");

        let attempt = || async { self.search.search(query, self.max_sources).await };
        let outcome = attempt
            .retry(&self.retry.backoff())
            .notify(|err: &anyhow::Error, dur: Duration| {
                warn!(
                    "Web search failed, retrying after {:.2}s: {err}",
                    dur.as_secs_f64()
                );
            })
            .await;

        match outcome {
            Ok(results) => {
                info!("Found {} search results", results.len());
                results
            }
            Err(err) => {
                error!("Web search failed: {err}");
                Vec::new()
            }
        }
    }

    /// Distill search results into a structured brief
    ///
    /// Completion failures propagate; malformed JSON degrades to the
    /// canonical empty brief. On success the model's own citation list is
    /// discarded in favor of the ground-truth search results.
    pub async fn create_research_brief(
        &self,
        angle: &str,
        search_results: &[SearchResult],
    ) -> Result<ResearchBrief> {
        info!("Creating structured research brief");

        let results_text = search_results
            .iter()
            .take(self.max_sources)
            .enumerate()
            .map(|(i, result)| format!("Source {}: {}\n{}", i + 1, result.title, result.body))
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = [
            Message::system(BRIEF_SYSTEM_PROMPT),
            Message::user(format!(
                "Research Angle: {angle}\n\nSearch Results:\n{results_text}"
            )),
        ];
        let response = self.llm.chat(&messages).await?;

        Ok(parse_brief(&response, search_results))
    }

    /// Conduct full research on a topic
    pub async fn research(&self, topic: &str) -> Result<ResearchReport> {
        info!("Starting research on: {topic}");

        let analysis = self.analyze_topic(topic).await?;
        let search_results = self.search_web(topic).await;

        // No source material: synthesizing a brief would waste a completion call
        let research_brief = if search_results.is_empty() {
            ResearchBrief::empty(Vec::new())
        } else {
            self.create_research_brief(topic, &search_results).await?
        };

        let sources_count = search_results.len();
        Ok(ResearchReport {
            topic: topic.to_string(),
            analysis,
            search_results,
            research_brief,
            sources_count,
        })
    }
}

/// Decide once, at the parse boundary, between a validated brief and the
/// canonical empty one. Partially-typed data never leaves this function.
fn parse_brief(response: &str, search_results: &[SearchResult]) -> ResearchBrief {
    let value: Value = match serde_json::from_str(response) {
        Ok(value) => value,
        Err(_) => {
            error!("Failed to parse research brief JSON");
            return ResearchBrief::empty(search_results.to_vec());
        }
    };

    if !value.is_object() {
        error!("Research brief JSON is not an object, falling back to empty brief");
        return ResearchBrief::empty(search_results.to_vec());
    }

    match serde_json::from_value::<ResearchBrief>(value) {
        Ok(mut brief) => {
            brief.raw_sources = search_results.to_vec();
            brief
        }
        Err(err) => {
            error!("Research brief JSON has unusable field types: {err}");
            ResearchBrief::empty(search_results.to_vec())
        }
    }
}
