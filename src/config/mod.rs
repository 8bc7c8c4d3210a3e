//! Configuration management for scribe
//!
//! One snapshot per process, loaded from environment variables (a local
//! `.env` file is honored). Invalid parameter ranges are rejected at load
//! time, never silently defaulted.

use anyhow::{bail, Context, Result};
use std::env;

use crate::images::UNSPLASH_MAX_PER_PAGE;

/// Configuration settings for the content creation pipeline
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub medium_access_token: Option<String>,
    pub unsplash_access_key: Option<String>,
    pub openai_model: String,
    pub temperature: f32,
    pub log_level: String,
    pub max_research_sources: usize,
    pub max_retries: usize,
    pub unsplash_per_page: usize,
    pub unsplash_order_by: String,
    pub unsplash_content_filter: String,
    pub unsplash_orientation: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            medium_access_token: None,
            unsplash_access_key: None,
            openai_model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.7,
            log_level: "info".to_string(),
            max_research_sources: 5,
            max_retries: 3,
            unsplash_per_page: 10,
            unsplash_order_by: "relevant".to_string(),
            unsplash_content_filter: "high".to_string(),
            unsplash_orientation: "landscape".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Self {
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            medium_access_token: non_empty_var("MEDIUM_ACCESS_TOKEN"),
            unsplash_access_key: non_empty_var("UNSPLASH_ACCESS_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            temperature: parse_var("TEMPERATURE", defaults.temperature)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            max_research_sources: parse_var("MAX_RESEARCH_SOURCES", defaults.max_research_sources)?,
            max_retries: parse_var("MAX_RETRIES", defaults.max_retries)?,
            unsplash_per_page: parse_var("UNSPLASH_PER_PAGE", defaults.unsplash_per_page)?,
            unsplash_order_by: env::var("UNSPLASH_ORDER_BY").unwrap_or(defaults.unsplash_order_by),
            unsplash_content_filter: env::var("UNSPLASH_CONTENT_FILTER")
                .unwrap_or(defaults.unsplash_content_filter),
            unsplash_orientation: env::var("UNSPLASH_ORIENTATION")
                .unwrap_or(defaults.unsplash_orientation),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges; fails fast at construction time
    pub fn validate(&self) -> Result<()> {
        if !(1..=UNSPLASH_MAX_PER_PAGE).contains(&self.unsplash_per_page) {
            bail!(
                "unsplash_per_page must be between 1 and {}",
                UNSPLASH_MAX_PER_PAGE
            );
        }
        if !["relevant", "latest"].contains(&self.unsplash_order_by.as_str()) {
            bail!("unsplash_order_by must be 'relevant' or 'latest'");
        }
        if !["low", "high"].contains(&self.unsplash_content_filter.as_str()) {
            bail!("unsplash_content_filter must be 'low' or 'high'");
        }
        if !["landscape", "portrait", "squarish"].contains(&self.unsplash_orientation.as_str()) {
            bail!("unsplash_orientation must be 'landscape', 'portrait', or 'squarish'");
        }
        Ok(())
    }

    /// Check that the required credential is present
    pub fn validate_required(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            bail!("OPENAI_API_KEY is required but not set");
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .ok()
            .with_context(|| format!("Invalid value for {name}: must be a number")),
        Err(_) => Ok(default),
    }
}
