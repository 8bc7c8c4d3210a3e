//! Pipeline orchestrator: sequences the stages and reports per-stage status

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::audience::AudienceStrategist;
use crate::config::Config;
use crate::images::ImageAgent;
use crate::llm::{CompletionClient, OpenAiClient};
use crate::publish::{PublishResult, Publisher};
use crate::research::{ResearchAgent, ResearchReport};
use crate::search::{DuckDuckGoClient, RetryPolicy, SearchProvider};
use crate::writer::{Article, WriterAgent};

/// Run-level state machine; `Failed` and `Completed` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    InProgress,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::InProgress => "in_progress",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        }
    }
}

/// Coarse status snapshot recorded after each stage
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<String, PublishResult>>,
}

impl StageReport {
    fn completed() -> Self {
        Self {
            status: "completed",
            sources_count: None,
            title: None,
            word_count: None,
            images_found: None,
            results: None,
        }
    }

    fn research(sources_count: usize) -> Self {
        Self {
            sources_count: Some(sources_count),
            ..Self::completed()
        }
    }

    fn writing(article: &Article) -> Self {
        Self {
            title: Some(article.title.clone()),
            word_count: Some(article.word_count),
            ..Self::completed()
        }
    }

    fn images(images_found: usize) -> Self {
        Self {
            images_found: Some(images_found),
            ..Self::completed()
        }
    }

    fn publishing(results: BTreeMap<String, PublishResult>) -> Self {
        Self {
            results: Some(results),
            ..Self::completed()
        }
    }
}

/// Article digest carried in the result envelope
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub title: String,
    pub word_count: usize,
    pub tags: Vec<String>,
    pub meta_description: String,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            word_count: article.word_count,
            tags: article.tags.clone(),
            meta_description: article.meta_description.clone(),
        }
    }
}

/// Run-level envelope returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub topic: String,
    pub status: PipelineStatus,
    pub stages: BTreeMap<String, StageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication: Option<BTreeMap<String, PublishResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    fn started(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            status: PipelineStatus::InProgress,
            stages: BTreeMap::new(),
            article: None,
            publication: None,
            error: None,
        }
    }

    /// Human-readable run summary
    pub fn summary(&self) -> String {
        if self.status != PipelineStatus::Completed {
            return format!("Pipeline status: {}", self.status.as_str());
        }

        let mut out = String::new();
        let _ = writeln!(out, "Content Creation Summary");
        let _ = writeln!(out, "========================");
        let _ = writeln!(out);
        let _ = writeln!(out, "Topic: {}", self.topic);
        let _ = writeln!(out, "Status: completed");
        let _ = writeln!(out);

        if let Some(article) = &self.article {
            let _ = writeln!(out, "Article Details:");
            let _ = writeln!(out, "- Title: {}", article.title);
            let _ = writeln!(out, "- Word Count: {}", article.word_count);
            let _ = writeln!(out, "- Tags: {}", article.tags.join(", "));
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "Pipeline Stages:");
        let sources = self
            .stages
            .get("research")
            .and_then(|s| s.sources_count)
            .unwrap_or(0);
        let images = self
            .stages
            .get("images")
            .and_then(|s| s.images_found)
            .unwrap_or(0);
        let _ = writeln!(out, "- Research: {sources} sources found");
        let _ = writeln!(out, "- Writing: Completed");
        let _ = writeln!(out, "- Images: {images} images found");
        let _ = writeln!(out, "- Publishing: Completed");
        let _ = writeln!(out);

        let _ = writeln!(out, "Publication Results:");
        if let Some(publication) = &self.publication {
            for (platform, result) in publication {
                if result.success {
                    let mut line = format!("- {}: Success", capitalize(platform));
                    if let Some(path) = &result.markdown_file {
                        let _ = write!(line, " (saved to {path})");
                    }
                    let _ = writeln!(out, "{line}");
                } else {
                    let _ = writeln!(
                        out,
                        "- {}: Failed ({})",
                        capitalize(platform),
                        result.error.as_deref().unwrap_or("Unknown error")
                    );
                }
            }
        }

        out
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Stage error carrying the envelope, so callers still own the run record
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct PipelineFailure {
    pub result: PipelineResult,
    pub cause: anyhow::Error,
}

/// One pipeline run request
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub topic: String,
    pub style: Option<String>,
    pub target_audience: Option<String>,
    pub platforms: Vec<String>,
    pub output_dir: PathBuf,
}

impl ContentRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            style: None,
            target_audience: None,
            platforms: vec!["file".to_string()],
            output_dir: PathBuf::from("output"),
        }
    }
}

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Research,
    Writing,
    Images,
    Publishing,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Writing => "writing",
            Stage::Images => "images",
            Stage::Publishing => "publishing",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Stage::Research => "Researching topic",
            Stage::Writing => "Writing article",
            Stage::Images => "Finding relevant images",
            Stage::Publishing => "Publishing content",
        }
    }
}

const STAGES: [Stage; 4] = [
    Stage::Research,
    Stage::Writing,
    Stage::Images,
    Stage::Publishing,
];

/// Working state threaded through the stage loop
#[derive(Default)]
struct RunContext {
    research: Option<ResearchReport>,
    article: Option<Article>,
    publication: Option<BTreeMap<String, PublishResult>>,
}

/// Orchestrates the content creation workflow
///
/// Each instance binds one configuration snapshot; nothing is shared across
/// runs, so concurrent runs need their own orchestrator.
pub struct Orchestrator {
    research: ResearchAgent,
    audience: AudienceStrategist,
    writer: WriterAgent,
    images: ImageAgent,
    publisher: Publisher,
}

impl Orchestrator {
    /// Build an orchestrator with the real completion and search clients
    pub fn new(config: &Config) -> Result<Self> {
        let llm: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.temperature,
        ));
        let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoClient::new());
        Self::with_clients(config, llm, search)
    }

    /// Build an orchestrator around injected collaborators
    pub fn with_clients(
        config: &Config,
        llm: Arc<dyn CompletionClient>,
        search: Arc<dyn SearchProvider>,
    ) -> Result<Self> {
        let retry = RetryPolicy {
            max_times: config.max_retries,
            ..RetryPolicy::default()
        };

        let orchestrator = Self {
            research: ResearchAgent::new(
                llm.clone(),
                search,
                config.max_research_sources,
                retry,
            ),
            audience: AudienceStrategist::new(llm.clone()),
            writer: WriterAgent::new(llm.clone()),
            images: ImageAgent::new(
                llm,
                config.unsplash_access_key.clone(),
                config.unsplash_per_page,
                &config.unsplash_order_by,
                &config.unsplash_content_filter,
                &config.unsplash_orientation,
            )?,
            publisher: Publisher::new(config.medium_access_token.clone()),
        };
        info!("Content creation orchestrator initialized");
        Ok(orchestrator)
    }

    /// Execute the full content creation pipeline
    ///
    /// Errors are recorded in the envelope and re-raised; the orchestrator
    /// never swallows a stage failure.
    pub async fn create_content(
        &self,
        request: &ContentRequest,
    ) -> Result<PipelineResult, PipelineFailure> {
        info!(
            "Starting content creation pipeline for topic: {}",
            request.topic
        );

        let mut result = PipelineResult::started(&request.topic);
        let mut ctx = RunContext::default();

        for (index, stage) in STAGES.iter().enumerate() {
            info!("Stage {}/{}: {}...", index + 1, STAGES.len(), stage.label());
            match self.run_stage(*stage, request, &mut ctx).await {
                Ok(report) => {
                    result.stages.insert(stage.name().to_string(), report);
                }
                Err(cause) => {
                    error!("Content creation pipeline failed: {cause}");
                    result.status = PipelineStatus::Failed;
                    result.error = Some(cause.to_string());
                    return Err(PipelineFailure { result, cause });
                }
            }
        }

        result.status = PipelineStatus::Completed;
        result.article = ctx.article.as_ref().map(ArticleSummary::from);
        result.publication = ctx.publication.take();
        info!(
            "Content creation pipeline completed successfully for: {}",
            request.topic
        );
        Ok(result)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        request: &ContentRequest,
        ctx: &mut RunContext,
    ) -> Result<StageReport> {
        match stage {
            Stage::Research => {
                let report = self.research.research(&request.topic).await?;
                info!("Research completed with {} sources", report.sources_count);
                let snapshot = StageReport::research(report.sources_count);
                ctx.research = Some(report);
                Ok(snapshot)
            }
            Stage::Writing => {
                let research = ctx
                    .research
                    .as_ref()
                    .context("research stage has not run")?;
                let persona = self
                    .audience
                    .analyze(&request.topic, request.target_audience.as_deref())
                    .await?;
                let article = self
                    .writer
                    .write_article(
                        &request.topic,
                        research,
                        request.style.as_deref(),
                        request.target_audience.as_deref(),
                        Some(&persona),
                    )
                    .await?;
                info!(
                    "Article completed: {} ({} words)",
                    article.title, article.word_count
                );
                let snapshot = StageReport::writing(&article);
                ctx.article = Some(article);
                Ok(snapshot)
            }
            Stage::Images => {
                let sources_count = ctx
                    .research
                    .as_ref()
                    .map(|r| r.sources_count)
                    .unwrap_or(0);
                let article = ctx.article.as_mut().context("writing stage has not run")?;
                let images = self.images.find_images(&request.topic, article).await?;
                info!("Found {} relevant images", images.len());
                let snapshot = StageReport::images(images.len());
                article.images = images;
                article.sources_count = sources_count;
                Ok(snapshot)
            }
            Stage::Publishing => {
                let article = ctx.article.as_ref().context("writing stage has not run")?;
                let publication =
                    self.publisher
                        .publish(article, &request.platforms, &request.output_dir);
                info!("Publishing completed");
                let snapshot = StageReport::publishing(publication.clone());
                ctx.publication = Some(publication);
                Ok(snapshot)
            }
        }
    }
}
