//! Image stage: query generation, Unsplash search, diversity selection

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::llm::{CompletionClient, Message};
use crate::writer::Article;

/// Provider-imposed ceiling on results per query
pub const UNSPLASH_MAX_PER_PAGE: usize = 30;

const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";
const UNSPLASH_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of images attached to one article
const SELECTION_QUOTA: usize = 3;

const QUERY_SYSTEM_PROMPT: &str = "You are an image curator. Generate 3-5 specific image search queries that would find relevant, high-quality images for this article.
The queries should be:
- Specific and descriptive
- Relevant to the main topic
- Suitable for professional content
- Diverse (different aspects of the topic)

Return only the queries, one per line.";

const SUGGESTION_SYSTEM_PROMPT: &str = "You are an image curator. Suggest 3 specific images that would be ideal for this article.
For each image, describe:
- What the image should show
- Why it's relevant
- Suggested placement in the article

Format each suggestion as:
Image N: [Description]
Why: [Relevance]
Placement: [Where in article]";

/// A curated illustration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: String,
    pub url: String,
    pub thumb_url: String,
    pub full_url: String,
    pub description: String,
    pub author: String,
    pub author_url: String,
    pub download_url: String,
    pub download_location: String,
    pub photo_link: String,
    pub width: u32,
    pub height: u32,
    pub color: String,
    pub likes: u64,
    pub tags: Vec<String>,
}

/// Agent responsible for finding and selecting relevant images
pub struct ImageAgent {
    llm: Arc<dyn CompletionClient>,
    access_key: Option<String>,
    per_page: usize,
    order_by: String,
    content_filter: String,
    orientation: String,
    http: reqwest::Client,
}

impl ImageAgent {
    /// Parameter ranges are validated here, never silently defaulted
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        access_key: Option<String>,
        per_page: usize,
        order_by: &str,
        content_filter: &str,
        orientation: &str,
    ) -> Result<Self> {
        if !(1..=UNSPLASH_MAX_PER_PAGE).contains(&per_page) {
            bail!(
                "per_page must be between 1 and {}, got {}",
                UNSPLASH_MAX_PER_PAGE,
                per_page
            );
        }
        if !["relevant", "latest"].contains(&order_by) {
            bail!("order_by must be 'relevant' or 'latest', got '{order_by}'");
        }
        if !["low", "high"].contains(&content_filter) {
            bail!("content_filter must be 'low' or 'high', got '{content_filter}'");
        }
        if !["landscape", "portrait", "squarish"].contains(&orientation) {
            bail!(
                "orientation must be 'landscape', 'portrait', or 'squarish', got '{orientation}'"
            );
        }

        Ok(Self {
            llm,
            access_key,
            per_page,
            order_by: order_by.to_string(),
            content_filter: content_filter.to_string(),
            orientation: orientation.to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// Generate up to 5 search phrases from an article preview
    pub async fn generate_image_queries(
        &self,
        topic: &str,
        article_content: &str,
    ) -> Result<Vec<String>> {
        info!("Generating image queries for: {topic}");

        let preview: String = article_content.chars().take(1000).collect();
        let messages = [
            Message::system(QUERY_SYSTEM_PROMPT),
            Message::user(format!("Topic: {topic}\n\nArticle preview:\n{preview}")),
        ];
        let response = self.llm.chat(&messages).await?;

        let mut queries: Vec<String> = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        queries.truncate(5);
        Ok(queries)
    }

    /// Search Unsplash for one query
    ///
    /// Any HTTP or decode failure returns an empty list so the query loop
    /// keeps going; partial coverage is acceptable.
    pub async fn search_unsplash(&self, query: &str, color: Option<&str>) -> Vec<Image> {
        let Some(key) = self.access_key.as_deref() else {
            warn!("Unsplash access key not provided, skipping image search");
            return Vec::new();
        };

        match self.query_unsplash(key, query, color).await {
            Ok(images) => {
                info!("Found {} images for query: {query}", images.len());
                images
            }
            Err(err) => {
                error!("Unsplash search failed: {err}");
                Vec::new()
            }
        }
    }

    async fn query_unsplash(
        &self,
        key: &str,
        query: &str,
        color: Option<&str>,
    ) -> Result<Vec<Image>> {
        let per_page = self.per_page.min(UNSPLASH_MAX_PER_PAGE).to_string();
        let mut params = vec![
            ("query", query),
            ("per_page", per_page.as_str()),
            ("order_by", self.order_by.as_str()),
            ("content_filter", self.content_filter.as_str()),
            ("orientation", self.orientation.as_str()),
        ];
        if let Some(color) = color {
            params.push(("color", color));
        }

        let response = self
            .http
            .get(UNSPLASH_SEARCH_URL)
            .header("Authorization", format!("Client-ID {key}"))
            .query(&params)
            .timeout(UNSPLASH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let parsed: SearchPhotosResponse = response.json().await?;
        Ok(parsed.results.into_iter().map(Image::from).collect())
    }

    /// Notify the provider of a selection, as its usage terms require
    ///
    /// Failures are logged and ignored; they never drop the image.
    pub async fn track_download(&self, download_location: &str) -> bool {
        let Some(key) = self.access_key.as_deref() else {
            info!("Unsplash access key not configured, download tracking skipped");
            return false;
        };

        let outcome = self
            .http
            .get(download_location)
            .header("Authorization", format!("Client-ID {key}"))
            .timeout(UNSPLASH_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match outcome {
            Ok(_) => {
                debug!("Download tracked successfully for: {download_location}");
                true
            }
            Err(err) => {
                error!("Failed to track download: {err}");
                false
            }
        }
    }

    /// Greedy two-pass diversity selection over the candidate pool
    ///
    /// Pass one takes at most one image per author; pass two fills remaining
    /// slots with ids not already selected. Order is preserved and the input
    /// pool is never mutated. Without a credential selection always yields
    /// nothing (no speculative free-tier use).
    pub fn select_best_images(&self, available_images: &[Image]) -> Vec<Image> {
        if available_images.is_empty() {
            warn!("No images available to select from");
            return Vec::new();
        }
        if self.access_key.is_none() {
            return Vec::new();
        }

        let mut selected: Vec<Image> = Vec::new();
        let mut seen_authors: HashSet<&str> = HashSet::new();

        for img in available_images {
            if selected.len() >= SELECTION_QUOTA {
                break;
            }
            if seen_authors.insert(img.author.as_str()) {
                selected.push(img.clone());
            }
        }

        for img in available_images {
            if selected.len() >= SELECTION_QUOTA {
                break;
            }
            if !selected.iter().any(|chosen| chosen.id == img.id) {
                selected.push(img.clone());
            }
        }

        selected
    }

    /// Find relevant images for an article
    pub async fn find_images(&self, topic: &str, article: &Article) -> Result<Vec<Image>> {
        info!("Finding images for: {topic}");

        let queries = self.generate_image_queries(topic, &article.content).await?;

        let mut all_images = Vec::new();
        for query in &queries {
            all_images.extend(self.search_unsplash(query, None).await);
        }

        let selected = self.select_best_images(&all_images);

        for image in &selected {
            if !image.download_location.is_empty() {
                self.track_download(&image.download_location).await;
            }
        }

        Ok(selected)
    }

    /// Textual guidance when no image credential is configured
    pub async fn generate_image_suggestions(
        &self,
        topic: &str,
        article_content: &str,
    ) -> Result<Vec<String>> {
        info!("Generating image suggestions for: {topic}");

        let preview: String = article_content.chars().take(1500).collect();
        let messages = [
            Message::system(SUGGESTION_SYSTEM_PROMPT),
            Message::user(format!("Topic: {topic}\n\nArticle:\n{preview}")),
        ];
        let response = self.llm.chat(&messages).await?;

        Ok(response.split("\n\n").map(str::to_string).collect())
    }
}

// Unsplash API response types

#[derive(Debug, Deserialize)]
struct SearchPhotosResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    id: String,
    urls: PhotoUrls,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    alt_description: Option<String>,
    user: PhotoUser,
    links: PhotoLinks,
    width: u32,
    height: u32,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    likes: Option<u64>,
    #[serde(default)]
    tags: Vec<PhotoTag>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
    thumb: String,
    full: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
    links: UserLinks,
}

#[derive(Debug, Deserialize)]
struct UserLinks {
    html: String,
}

#[derive(Debug, Deserialize)]
struct PhotoLinks {
    download: String,
    download_location: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct PhotoTag {
    #[serde(default)]
    title: String,
}

impl From<UnsplashPhoto> for Image {
    fn from(photo: UnsplashPhoto) -> Self {
        let description = photo
            .description
            .or(photo.alt_description)
            .unwrap_or_default();
        Image {
            id: photo.id,
            url: photo.urls.regular,
            thumb_url: photo.urls.thumb,
            full_url: photo.urls.full,
            description,
            author: photo.user.name,
            author_url: photo.user.links.html,
            download_url: photo.links.download,
            download_location: photo.links.download_location,
            photo_link: photo.links.html,
            width: photo.width,
            height: photo.height,
            color: photo.color.unwrap_or_default(),
            likes: photo.likes.unwrap_or(0),
            tags: photo.tags.into_iter().map(|tag| tag.title).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _messages: &[Message]) -> Result<String> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "out of responses".to_string()))
        }
    }

    fn agent(access_key: Option<&str>, responses: &[&str]) -> ImageAgent {
        ImageAgent::new(
            ScriptedLlm::new(responses),
            access_key.map(str::to_string),
            10,
            "relevant",
            "high",
            "landscape",
        )
        .unwrap()
    }

    fn image(id: &str, author: &str) -> Image {
        Image {
            id: id.into(),
            author: author.into(),
            ..Default::default()
        }
    }

    #[test]
    fn constructor_rejects_out_of_range_parameters() {
        let llm = ScriptedLlm::new(&[]);
        assert!(ImageAgent::new(llm.clone(), None, 0, "relevant", "high", "landscape").is_err());
        assert!(ImageAgent::new(llm.clone(), None, 31, "relevant", "high", "landscape").is_err());
        assert!(ImageAgent::new(llm.clone(), None, 10, "newest", "high", "landscape").is_err());
        assert!(ImageAgent::new(llm.clone(), None, 10, "relevant", "medium", "landscape").is_err());
        assert!(ImageAgent::new(llm.clone(), None, 10, "relevant", "high", "panoramic").is_err());
        assert!(ImageAgent::new(llm, None, 30, "latest", "low", "squarish").is_ok());
    }

    #[test]
    fn selection_prefers_distinct_authors_in_order() {
        let agent = agent(Some("key"), &[]);
        let pool = vec![
            image("a", "alice"),
            image("b", "alice"),
            image("c", "bob"),
            image("d", "carol"),
            image("e", "dave"),
        ];
        let selected = agent.select_best_images(&pool);
        let ids: Vec<&str> = selected.iter().map(|img| img.id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "d"]);
    }

    #[test]
    fn selection_fills_quota_when_authors_repeat() {
        let agent = agent(Some("key"), &[]);
        let pool = vec![
            image("a", "alice"),
            image("b", "alice"),
            image("c", "alice"),
            image("d", "alice"),
        ];
        let selected = agent.select_best_images(&pool);
        let ids: Vec<&str> = selected.iter().map(|img| img.id.as_str()).collect();
        // one diverse pick, then the fill pass completes the quota in order
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn selection_never_exceeds_three() {
        let agent = agent(Some("key"), &[]);
        let pool: Vec<Image> = (0..5)
            .map(|i| image(&format!("id{i}"), &format!("author{i}")))
            .collect();
        let selected = agent.select_best_images(&pool);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[2].id, "id2");
    }

    #[test]
    fn selection_with_no_candidates_is_empty() {
        let agent = agent(Some("key"), &[]);
        assert!(agent.select_best_images(&[]).is_empty());
    }

    #[test]
    fn selection_without_credential_is_always_empty() {
        let agent = agent(None, &[]);
        let pool = vec![image("a", "alice"), image("b", "bob"), image("c", "carol")];
        assert!(agent.select_best_images(&pool).is_empty());
    }

    #[test]
    fn selection_does_not_duplicate_ids() {
        let agent = agent(Some("key"), &[]);
        // same id appears twice in the pool; the fill pass must skip it
        let pool = vec![image("a", "alice"), image("a", "alice"), image("b", "alice")];
        let selected = agent.select_best_images(&pool);
        let ids: Vec<&str> = selected.iter().map(|img| img.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn queries_are_trimmed_and_capped_at_five() {
        let agent = agent(
            Some("key"),
            &["  office desk  \n\nremote team call\nlaptop\ncoffee\nwhiteboard\nextra query"],
        );
        let queries = agent
            .generate_image_queries("Remote Work", "article body")
            .await
            .unwrap();
        assert_eq!(queries.len(), 5);
        assert_eq!(queries[0], "office desk");
        assert!(!queries.contains(&"extra query".to_string()));
    }

    #[tokio::test]
    async fn search_without_credential_returns_empty() {
        let agent = agent(None, &[]);
        assert!(agent.search_unsplash("desk", None).await.is_empty());
    }

    #[tokio::test]
    async fn track_download_without_credential_reports_false() {
        let agent = agent(None, &[]);
        assert!(!agent.track_download("https://example.com/dl").await);
    }

    #[tokio::test]
    async fn suggestions_split_into_paragraphs() {
        let agent = agent(
            None,
            &["Image 1: A desk\nWhy: relevant\nPlacement: intro\n\nImage 2: A team\nWhy: human\nPlacement: middle"],
        );
        let suggestions = agent
            .generate_image_suggestions("Remote Work", "body")
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions[0].starts_with("Image 1"));
    }

    #[test]
    fn photo_response_maps_into_image() {
        let raw = r##"{
            "results": [{
                "id": "abc123",
                "urls": {"regular": "https://img/r", "thumb": "https://img/t", "full": "https://img/f"},
                "description": null,
                "alt_description": "a tidy desk",
                "user": {"name": "Alice", "links": {"html": "https://unsplash.com/@alice"}},
                "links": {"download": "https://img/dl", "download_location": "https://api/dl", "html": "https://unsplash.com/p/abc123"},
                "width": 4000,
                "height": 3000,
                "color": "#aabbcc",
                "likes": 12,
                "tags": [{"title": "desk"}, {"title": "office"}]
            }]
        }"##;
        let parsed: SearchPhotosResponse = serde_json::from_str(raw).unwrap();
        let image = Image::from(parsed.results.into_iter().next().unwrap());
        assert_eq!(image.id, "abc123");
        assert_eq!(image.description, "a tidy desk");
        assert_eq!(image.author, "Alice");
        assert_eq!(image.download_location, "https://api/dl");
        assert_eq!(image.tags, vec!["desk", "office"]);
    }
}
