use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scribe_cli::config::Config;
use scribe_cli::pipeline::{ContentRequest, Orchestrator};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(author, about = "Scribe - automated content research, writing, and publishing", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), env!("SCRIBE_VERSION_SUFFIX")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research, write, illustrate, and publish content on a topic
    Create {
        /// Topic to create content about
        topic: String,

        /// Writing style (e.g. professional, casual, technical)
        #[arg(long)]
        style: Option<String>,

        /// Target audience description
        #[arg(long)]
        audience: Option<String>,

        /// Publishing platform(s); repeat the flag for several
        #[arg(long = "platform", default_values_t = [String::from("file")])]
        platforms: Vec<String>,

        /// Output directory for file publishing
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Logging level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,
    },

    /// Display the current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            topic,
            style,
            audience,
            platforms,
            output_dir,
            log_level,
        } => {
            init_logging(&log_level);
            run_create(topic, style, audience, platforms, output_dir).await
        }
        Commands::Config => {
            init_logging("warn");
            show_config()
        }
    }
}

fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_create(
    topic: String,
    style: Option<String>,
    audience: Option<String>,
    platforms: Vec<String>,
    output_dir: PathBuf,
) -> Result<()> {
    let config = match Config::from_env().and_then(|c| {
        c.validate_required()?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            eprintln!("Set the required environment variables (or provide a .env file).");
            std::process::exit(2);
        }
    };

    println!("Scribe - automated content creation");
    println!("Topic: {topic}");

    let orchestrator = Orchestrator::new(&config)?;
    let request = ContentRequest {
        topic,
        style,
        target_audience: audience,
        platforms,
        output_dir,
    };

    match orchestrator.create_content(&request).await {
        Ok(result) => {
            println!("\nContent creation completed successfully.\n");
            println!("{}", result.summary());
            Ok(())
        }
        Err(failure) => {
            eprintln!("\nContent creation failed: {failure}");
            Err(failure.cause)
        }
    }
}

fn show_config() -> Result<()> {
    let config = Config::from_env()?;

    println!("Current Configuration");
    println!();
    println!("OpenAI Model: {}", config.openai_model);
    println!("Temperature: {}", config.temperature);
    println!("Max Research Sources: {}", config.max_research_sources);
    println!("Max Retries: {}", config.max_retries);
    println!("Log Level: {}", config.log_level);
    println!(
        "Unsplash Search: per_page={} order_by={} content_filter={} orientation={}",
        config.unsplash_per_page,
        config.unsplash_order_by,
        config.unsplash_content_filter,
        config.unsplash_orientation
    );
    println!();
    println!("API Keys:");
    println!(
        "  OpenAI: {}",
        if config.openai_api_key.is_empty() {
            "not set"
        } else {
            "set"
        }
    );
    println!(
        "  Medium: {}",
        if config.medium_access_token.is_some() {
            "set"
        } else {
            "not set (optional)"
        }
    );
    println!(
        "  Unsplash: {}",
        if config.unsplash_access_key.is_some() {
            "set"
        } else {
            "not set (optional)"
        }
    );
    Ok(())
}
