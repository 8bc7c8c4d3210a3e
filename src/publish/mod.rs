//! Publication stage: file sink and the Medium stub

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::writer::Article;

const IMAGE_SOURCE: &str = "Unsplash";

/// Outcome of one platform dispatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishResult {
    fn failure(platform: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            platform: platform.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Agent responsible for publishing content to platforms
pub struct Publisher {
    medium_token: Option<String>,
}

impl Publisher {
    pub fn new(medium_token: Option<String>) -> Self {
        Self { medium_token }
    }

    /// Deterministic filename stem from a title
    pub fn slugify(title: &str) -> String {
        let cleaned: String = title
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == ' ' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        cleaned
            .replace(' ', "_")
            .to_lowercase()
            .chars()
            .take(50)
            .collect()
    }

    /// Publish to each requested platform; results are independent
    pub fn publish(
        &self,
        article: &Article,
        platforms: &[String],
        output_dir: &Path,
    ) -> BTreeMap<String, PublishResult> {
        let mut results = BTreeMap::new();

        for platform in platforms {
            match platform.to_lowercase().as_str() {
                "medium" => {
                    results.insert("medium".to_string(), self.publish_to_medium(article));
                }
                "file" => {
                    results.insert("file".to_string(), self.save_to_file(article, output_dir));
                }
                _ => {
                    warn!("Unknown platform: {platform}");
                    results.insert(
                        platform.clone(),
                        PublishResult::failure(
                            platform,
                            format!("Platform '{platform}' not supported"),
                        ),
                    );
                }
            }
        }

        results
    }

    /// Remote publishing platform stub
    ///
    /// A configured token reports the article as ready with a placeholder
    /// URL; a real client is out of scope.
    pub fn publish_to_medium(&self, article: &Article) -> PublishResult {
        if self.medium_token.is_none() {
            warn!("Medium token not provided, skipping Medium publication");
            return PublishResult::failure("medium", "Medium API token not configured");
        }

        info!("Publishing to Medium: {}", article.title);
        PublishResult {
            success: true,
            platform: "medium".to_string(),
            message: Some(
                "Article ready for Medium publication (API token required for actual publishing)"
                    .to_string(),
            ),
            url: Some("https://medium.com/@your-username/your-article".to_string()),
            ..Default::default()
        }
    }

    /// Render the article and its metadata sidecar to the file system
    pub fn save_to_file(&self, article: &Article, output_dir: &Path) -> PublishResult {
        match self.render_to_dir(article, output_dir) {
            Ok((markdown_file, metadata_file)) => {
                info!("Article saved to: {}", markdown_file.display());
                PublishResult {
                    success: true,
                    platform: "file".to_string(),
                    markdown_file: Some(markdown_file.display().to_string()),
                    metadata_file: Some(metadata_file.display().to_string()),
                    ..Default::default()
                }
            }
            Err(err) => {
                error!("File save failed: {err}");
                PublishResult::failure("file", err.to_string())
            }
        }
    }

    fn render_to_dir(&self, article: &Article, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let slug = Self::slugify(&article.title);
        let markdown_path = output_dir.join(format!("{slug}.md"));
        let metadata_path = output_dir.join(format!("{slug}_metadata.json"));

        fs::write(&markdown_path, render_markdown(article))
            .with_context(|| format!("Failed to write {}", markdown_path.display()))?;

        let metadata = serde_json::json!({
            "title": article.title,
            "topic": article.topic,
            "word_count": article.word_count,
            "tags": article.tags,
            "meta_description": article.meta_description,
            "images": article.images,
            "sources_count": article.sources_count,
        });
        fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)
            .with_context(|| format!("Failed to write {}", metadata_path.display()))?;

        Ok((markdown_path, metadata_path))
    }
}

fn render_markdown(article: &Article) -> String {
    let mut doc = String::new();
    let _ = write!(
        doc,
        "# {}\n\n**Topic:** {}\n\n**Word Count:** {}\n\n**Tags:** {}\n\n**Meta Description:** {}\n\n---\n\n{}",
        article.title,
        article.topic,
        article.word_count,
        article.tags.join(", "),
        article.meta_description,
        article.content,
    );

    if !article.images.is_empty() {
        doc.push_str("\n\n## Visuals\n\n");
        for img in &article.images {
            let _ = writeln!(doc, "![{}]({})", img.description, img.url);
            if img.author_url.is_empty() {
                let _ = write!(doc, "*Photo by {} on {}*\n\n", img.author, IMAGE_SOURCE);
            } else {
                let _ = write!(
                    doc,
                    "*Photo by [{}]({}) on {}*\n\n",
                    img.author, img.author_url, IMAGE_SOURCE
                );
            }
        }
    }

    doc
}
