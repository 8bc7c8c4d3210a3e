//! Writing stage: outline, full draft, and article metadata

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::audience::Persona;
use crate::images::Image;
use crate::llm::{CompletionClient, Message};
use crate::research::{ResearchBrief, ResearchReport};

/// Final content artifact
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub outline: String,
    pub meta_description: String,
    pub tags: Vec<String>,
    pub word_count: usize,
    pub topic: String,
    /// Filled in by the image stage after drafting
    pub images: Vec<Image>,
    /// Filled in by the orchestrator from the research report
    pub sources_count: usize,
}

/// Agent responsible for writing articles based on research
pub struct WriterAgent {
    llm: Arc<dyn CompletionClient>,
}

impl WriterAgent {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Flatten a structured brief into labeled bullet sections
    ///
    /// Sections with no content are omitted entirely, so the prompt never
    /// carries empty headers.
    pub fn format_research_brief(brief: &ResearchBrief) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !brief.key_statistics.is_empty() {
            sections.push("Key Statistics:".into());
            for stat in &brief.key_statistics {
                sections.push(format!("- {}", stat.render("statistic")));
            }
        }

        if !brief.expert_quotes.is_empty() {
            sections.push("\nExpert Quotes:".into());
            for quote in &brief.expert_quotes {
                sections.push(format!("- {}", quote.render("quote")));
            }
        }

        if !brief.case_studies.is_empty() {
            sections.push("\nCase Studies:".into());
            for study in &brief.case_studies {
                sections.push(format!("- {}", study.render("summary")));
            }
        }

        if !brief.key_definitions.is_empty() {
            sections.push("\nKey Definitions:".into());
            for (term, definition) in &brief.key_definitions {
                sections.push(format!("- {term}: {definition}"));
            }
        }

        if !brief.counter_arguments.is_empty() {
            sections.push("\nCounter Arguments:".into());
            for arg in &brief.counter_arguments {
                sections.push(format!("- {arg}"));
            }
        }

        sections.join("\n")
    }

    /// Persona fragment for outline generation: only the fields that act as
    /// structural constraints.
    fn outline_persona_context(persona: &Persona) -> String {
        let mut ctx = String::new();
        if !persona.persona_name.is_empty() {
            ctx.push_str(&format!("\nTarget Audience: {}", persona.persona_name));
        }
        if !persona.goals.primary_goal.is_empty() {
            ctx.push_str(&format!("\nAudience Goal: {}", persona.goals.primary_goal));
        }
        if !persona.pain_points.is_empty() {
            let pain_points = persona
                .pain_points
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            ctx.push_str(&format!("\nAddress Pain Points: {pain_points}"));
        }
        if !persona.knowledge_state.what_they_need.is_empty() {
            ctx.push_str(&format!(
                "\nInformation Needs: {}",
                persona.knowledge_state.what_they_need
            ));
        }
        ctx
    }

    /// Persona fragment for drafting: the outline fields plus content
    /// preferences and available reading time.
    fn drafting_persona_context(persona: &Persona) -> String {
        let mut ctx = String::new();
        if !persona.persona_name.is_empty() {
            ctx.push_str(&format!("\nTarget Reader: {}", persona.persona_name));
        }
        if !persona.content_preferences.tone.is_empty() {
            ctx.push_str(&format!(
                "\nPreferred Tone: {}",
                persona.content_preferences.tone
            ));
        }
        if !persona.content_preferences.depth.is_empty() {
            ctx.push_str(&format!(
                "\nDepth Level: {}",
                persona.content_preferences.depth
            ));
        }
        if !persona.goals.primary_goal.is_empty() {
            ctx.push_str(&format!("\nReader's Goal: {}", persona.goals.primary_goal));
        }
        if !persona.knowledge_state.what_they_need.is_empty() {
            ctx.push_str(&format!(
                "\nWhat Reader Needs: {}",
                persona.knowledge_state.what_they_need
            ));
        }
        if !persona.pain_points.is_empty() {
            let pain_points = persona
                .pain_points
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            ctx.push_str(&format!("\nAddress Pain Points: {pain_points}"));
        }
        if !persona.reading_context.attention_span.is_empty() {
            ctx.push_str(&format!(
                "\nReader Time Available: {}",
                persona.reading_context.attention_span
            ));
        }
        ctx
    }

    /// Create an article outline from the flattened research
    pub async fn create_outline(
        &self,
        topic: &str,
        research: &str,
        persona: Option<&Persona>,
    ) -> Result<String> {
        info!("Creating outline for: {topic}");

        let persona_context = persona.map(Self::outline_persona_context).unwrap_or_default();
        let system = format!(
            "You are a professional content writer. Create a detailed article outline with:
1. An engaging title
2. Introduction hook
3. 3-5 main sections with subsections
4. Conclusion
5. Key points to cover in each section

The outline should be logical, engaging, and comprehensive.
Tailor the structure to the target audience:{persona_context}"
        );

        let messages = [
            Message::system(system),
            Message::user(format!("Topic: {topic}\n\nResearch:\n{research}")),
        ];
        self.llm.chat(&messages).await
    }

    /// Write a complete article based on research
    ///
    /// No retries here: a completion failure propagates to the orchestrator.
    pub async fn write_article(
        &self,
        topic: &str,
        research_data: &ResearchReport,
        style: Option<&str>,
        target_audience: Option<&str>,
        persona: Option<&Persona>,
    ) -> Result<Article> {
        info!("Writing article on: {topic}");

        let research_synthesis = Self::format_research_brief(&research_data.research_brief);
        let research_analysis = &research_data.analysis;

        let mut style_instruction = String::new();
        if let Some(style) = style {
            style_instruction.push_str(&format!("\nWriting Style: {style}"));
        }
        if let Some(audience) = target_audience {
            style_instruction.push_str(&format!("\nTarget Audience: {audience}"));
        }

        let persona_instruction = persona.map(Self::drafting_persona_context).unwrap_or_default();

        let outline = self
            .create_outline(topic, &research_synthesis, persona)
            .await?;

        let system = format!(
            "You are a professional content writer. Write a comprehensive, engaging article based on the provided research and outline.

Requirements:
- Follow the outline structure
- Write 1200-1500 words
- Use clear, engaging language
- Include an introduction, body sections, and conclusion
- Add smooth transitions between sections
- Cite key facts and statistics when relevant
- Use markdown formatting (headers, bold, italics, lists)
- Make it informative yet accessible{style_instruction}{persona_instruction}"
        );
        let messages = [
            Message::system(system),
            Message::user(format!(
                "Topic: {topic}\n\nOutline:\n{outline}\n\nResearch:\n{research_synthesis}\n\nAnalysis:\n{research_analysis}"
            )),
        ];
        let content = self.llm.chat(&messages).await?;

        let title = extract_title(&content)
            .unwrap_or_else(|| format!("A Comprehensive Guide to {topic}"));
        let meta_description = self.generate_meta_description(topic, &content).await?;
        let tags = self
            .generate_tags(topic, &research_data.research_brief)
            .await?;
        let word_count = content.split_whitespace().count();

        Ok(Article {
            title,
            content,
            outline,
            meta_description,
            tags,
            word_count,
            topic: topic.to_string(),
            images: Vec::new(),
            sources_count: 0,
        })
    }

    /// Generate a meta description (150-160 characters, advisory only)
    async fn generate_meta_description(&self, topic: &str, content: &str) -> Result<String> {
        let preview: String = content.chars().take(500).collect();
        let messages = [
            Message::system(
                "Generate a compelling meta description (150-160 characters) for this article.",
            ),
            Message::user(format!("Topic: {topic}\n\nContent preview:\n{preview}")),
        ];
        let response = self.llm.chat(&messages).await?;
        Ok(response.trim().to_string())
    }

    /// Generate up to 8 tags from the topic and research
    async fn generate_tags(&self, topic: &str, brief: &ResearchBrief) -> Result<Vec<String>> {
        let research_text: String = Self::format_research_brief(brief)
            .chars()
            .take(500)
            .collect();
        let messages = [
            Message::system(
                "Generate 5-8 relevant tags for this article. Return only the tags, comma-separated.",
            ),
            Message::user(format!("Topic: {topic}\n\nResearch: {research_text}")),
        ];
        let response = self.llm.chat(&messages).await?;

        let mut tags: Vec<String> = response.split(',').map(|tag| tag.trim().to_string()).collect();
        tags.truncate(8);
        Ok(tags)
    }
}

/// Scan for the first single-level markdown header and return its text
pub fn extract_title(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix("# ")
            .map(|rest| rest.trim().to_string())
    })
}
