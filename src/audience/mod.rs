//! Audience stage: reader persona synthesis

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::llm::{CompletionClient, Message};

const PERSONA_SYSTEM_PROMPT: &str = r#"You are an audience research specialist. Create a detailed reader persona for someone who would benefit most from an article on the given topic.

Return your analysis as a JSON object with the following structure:
{
    "persona_name": "A descriptive name (e.g., 'Sarah, the Tech Startup CTO')",
    "demographics": {
        "job_title": "...",
        "industry": "...",
        "experience_level": "beginner|intermediate|expert"
    },
    "knowledge_state": {
        "what_they_know": "What they already understand about this topic",
        "what_they_need": "What they need to learn",
        "knowledge_gaps": ["specific gap 1", "specific gap 2"]
    },
    "goals": {
        "primary_goal": "What they want to achieve by reading this",
        "use_case": "How they will apply this information",
        "success_metric": "How they will know they succeeded"
    },
    "pain_points": [
        "Frustration 1 with existing content",
        "Frustration 2",
        "Frustration 3"
    ],
    "reading_context": {
        "when": "When they typically read this content",
        "where": "Where they read (mobile, desktop, etc.)",
        "attention_span": "How much time they have"
    },
    "content_preferences": {
        "tone": "preferred tone (e.g., conversational, formal, technical)",
        "depth": "preferred depth level",
        "format": "preferred format elements (e.g., code examples, diagrams)"
    }
}

Be specific and realistic. Base the persona on actual user behaviors, not stereotypes.
Return ONLY the JSON object, no additional text."#;

/// Keys a persona must carry to count as complete
const REQUIRED_PERSONA_KEYS: [&str; 7] = [
    "persona_name",
    "demographics",
    "knowledge_state",
    "goals",
    "pain_points",
    "reading_context",
    "content_preferences",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Demographics {
    pub job_title: String,
    pub industry: String,
    pub experience_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeState {
    pub what_they_know: String,
    pub what_they_need: String,
    pub knowledge_gaps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Goals {
    pub primary_goal: String,
    pub use_case: String,
    pub success_metric: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadingContext {
    pub when: String,
    #[serde(rename = "where")]
    pub where_: String,
    pub attention_span: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentPreferences {
    pub tone: String,
    pub depth: String,
    pub format: String,
}

/// A synthetic reader profile used to bias writing tone and depth
///
/// Always fully keyed: either decoded wholesale from upstream JSON or
/// replaced by [`Persona::general_reader`]. Partial personas are never
/// emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Persona {
    pub persona_name: String,
    pub demographics: Demographics,
    pub knowledge_state: KnowledgeState,
    pub goals: Goals,
    pub pain_points: Vec<String>,
    pub reading_context: ReadingContext,
    pub content_preferences: ContentPreferences,
}

impl Persona {
    /// Canonical default persona: a generic professional reader
    pub fn general_reader() -> Self {
        Self {
            persona_name: "General Reader".into(),
            demographics: Demographics {
                job_title: "Unknown".into(),
                industry: "Unknown".into(),
                experience_level: "intermediate".into(),
            },
            knowledge_state: KnowledgeState {
                what_they_know: "Basic understanding of the topic".into(),
                what_they_need: "Comprehensive overview".into(),
                knowledge_gaps: Vec::new(),
            },
            goals: Goals {
                primary_goal: "Learn about the topic".into(),
                use_case: "General understanding".into(),
                success_metric: "Improved knowledge".into(),
            },
            pain_points: Vec::new(),
            reading_context: ReadingContext {
                when: "During work hours".into(),
                where_: "Desktop".into(),
                attention_span: "10-15 minutes".into(),
            },
            content_preferences: ContentPreferences {
                tone: "professional".into(),
                depth: "moderate".into(),
                format: "structured with examples".into(),
            },
        }
    }
}

/// Agent responsible for analyzing the target audience
pub struct AudienceStrategist {
    llm: Arc<dyn CompletionClient>,
}

impl AudienceStrategist {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Create a reader persona for the topic
    ///
    /// Same parse discipline as the research brief: strict JSON decode, and
    /// anything that is not a usable object becomes the default persona.
    pub async fn analyze(&self, topic: &str, audience_hint: Option<&str>) -> Result<Persona> {
        info!("Creating audience persona for: {topic}");

        let audience_context = audience_hint
            .map(|hint| format!("\nTarget Audience Hint: {hint}"))
            .unwrap_or_default();
        let messages = [
            Message::system(PERSONA_SYSTEM_PROMPT),
            Message::user(format!("Topic: {topic}{audience_context}")),
        ];
        let response = self.llm.chat(&messages).await?;

        Ok(parse_persona(&response))
    }
}

fn parse_persona(response: &str) -> Persona {
    let value: Value = match serde_json::from_str(response) {
        Ok(value) => value,
        Err(_) => {
            error!("Failed to parse persona JSON, returning default persona");
            return Persona::general_reader();
        }
    };

    if !value.is_object() {
        error!("Persona JSON is not an object, returning default persona");
        return Persona::general_reader();
    }

    match serde_json::from_value::<Persona>(value) {
        Ok(persona) => {
            info!("Created persona: {}", persona.persona_name);
            persona
        }
        Err(err) => {
            error!("Persona JSON has unusable field types: {err}");
            Persona::general_reader()
        }
    }
}

/// Check that a raw persona document carries all seven required keys
///
/// For callers holding upstream JSON who want to distinguish complete-looking
/// personas without re-parsing into [`Persona`].
pub fn validate_persona(persona: &Value) -> bool {
    match persona.as_object() {
        Some(map) => REQUIRED_PERSONA_KEYS.iter().all(|key| map.contains_key(*key)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct CapturingLlm {
        last_user_message: Mutex<String>,
    }

    impl CapturingLlm {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                last_user_message: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for CapturingLlm {
        fn name(&self) -> &str {
            "capturing"
        }

        async fn chat(&self, messages: &[Message]) -> Result<String> {
            if let Some(user) = messages.iter().find(|m| m.role == crate::llm::Role::User) {
                *self.last_user_message.lock().unwrap() = user.content.clone();
            }
            Ok("not json".to_string())
        }
    }

    #[tokio::test]
    async fn audience_hint_is_embedded_in_the_prompt() {
        let llm = CapturingLlm::new();
        let strategist = AudienceStrategist::new(llm.clone());

        strategist
            .analyze("Remote Work", Some("engineering managers"))
            .await
            .unwrap();
        let prompt = llm.last_user_message.lock().unwrap().clone();
        assert!(prompt.contains("Topic: Remote Work"));
        assert!(prompt.contains("Target Audience Hint: engineering managers"));

        strategist.analyze("Remote Work", None).await.unwrap();
        let prompt = llm.last_user_message.lock().unwrap().clone();
        assert!(!prompt.contains("Target Audience Hint"));
    }

    #[test]
    fn valid_json_becomes_persona() {
        let response = r#"{
            "persona_name": "Sarah, the Tech Startup CTO",
            "demographics": {"job_title": "CTO", "industry": "SaaS", "experience_level": "expert"},
            "knowledge_state": {"what_they_know": "basics", "what_they_need": "depth", "knowledge_gaps": ["scaling"]},
            "goals": {"primary_goal": "Ship faster", "use_case": "team process", "success_metric": "cycle time"},
            "pain_points": ["shallow posts"],
            "reading_context": {"when": "evenings", "where": "mobile", "attention_span": "5 minutes"},
            "content_preferences": {"tone": "technical", "depth": "deep", "format": "code examples"}
        }"#;
        let persona = parse_persona(response);
        assert_eq!(persona.persona_name, "Sarah, the Tech Startup CTO");
        assert_eq!(persona.reading_context.where_, "mobile");
        assert_eq!(persona.pain_points, vec!["shallow posts".to_string()]);
    }

    #[test]
    fn missing_keys_fill_with_empty_values_not_partials() {
        let persona = parse_persona(r#"{"persona_name": "Terse"}"#);
        assert_eq!(persona.persona_name, "Terse");
        // every sub-structure exists, so downstream code never checks keys
        assert_eq!(persona.goals.primary_goal, "");
        assert!(persona.pain_points.is_empty());
    }

    #[test]
    fn invalid_json_yields_default_persona() {
        for bad in ["nonsense", "[\"a\"]", "\"string\"", "3.14"] {
            let persona = parse_persona(bad);
            assert_eq!(persona, Persona::general_reader(), "input {bad:?}");
        }
    }

    #[test]
    fn default_persona_matches_canonical_values() {
        let persona = Persona::general_reader();
        assert_eq!(persona.persona_name, "General Reader");
        assert_eq!(persona.demographics.experience_level, "intermediate");
        assert_eq!(persona.reading_context.attention_span, "10-15 minutes");
        assert_eq!(persona.content_preferences.tone, "professional");
    }

    #[test]
    fn validator_requires_all_seven_keys() {
        let complete = serde_json::to_value(Persona::general_reader()).unwrap();
        assert!(validate_persona(&complete));

        let mut missing = complete.clone();
        missing.as_object_mut().unwrap().remove("goals");
        assert!(!validate_persona(&missing));

        assert!(!validate_persona(&json!({})));
        assert!(!validate_persona(&json!(["not", "an", "object"])));
    }
}
