//! headline-caster: reads news headlines aloud as short newscaster narrations.

mod config;
mod error;
mod headlines;
mod narrator;
mod pipeline;
mod speaker;
#[cfg(test)]
mod test_support;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::NewsMode;
use crate::headlines::NewsClient;
use crate::narrator::GeminiSession;
use crate::pipeline::Pipeline;
use crate::speaker::TranslateSpeaker;

#[derive(Parser, Debug)]
#[command(name = "headline-caster", about = "Read news headlines aloud in a newscaster voice")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Search NewsAPI for this term instead of the configured source
    #[arg(short, long, conflicts_with = "country")]
    query: Option<String>,

    /// Use top headlines for this two-letter country code
    #[arg(long)]
    country: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG wins when set; otherwise keep HTTP/audio internals quiet.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug,hyper=info,reqwest=info,rodio=info")
        } else {
            EnvFilter::new("info,hyper=warn,reqwest=warn,rodio=warn")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("headline-caster starting");

    config::load_dotenv()?;
    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(query) = args.query {
        config.news.mode = NewsMode::Search;
        config.news.query = query;
    }
    if let Some(country) = args.country {
        config.news.mode = NewsMode::Country;
        config.news.country = country;
    }
    let credentials = config.credentials()?;

    let selection = config.news.selection();
    info!("Headline source: {selection:?}");
    let news = NewsClient::new(&config.news, credentials.news_api_key)?;
    let titles = news.fetch_headlines(&selection).await?;

    let session = GeminiSession::connect(&config.gemini, credentials.gemini_api_key).await?;
    let speaker = TranslateSpeaker::new(&config.speech)?;

    let mut pipeline = Pipeline::new(session, speaker, &config.pipeline)?;
    let summary = pipeline.run(&titles).await?;

    info!(
        "Done: {} narrated, {} skipped, {} fallbacks, {} speech failures",
        summary.processed, summary.skipped, summary.fallbacks, summary.speech_failures
    );

    Ok(())
}
