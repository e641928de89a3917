//! Command-line interface for chanscribe.
//!
//! Provides commands for extracting a channel, scanning it without
//! extracting, inspecting stored progress, trying the classifier,
//! checking or re-filing the transcript tree, and regenerating the indexes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{VideoSource, YouTubeSource};
use crate::config::Config;
use crate::core::{BatchProcessor, Classifier, RunSummary};
use crate::library::{ChannelAnalysis, FsSink, ReportWriter};

/// Items listed by `scan`
const SCAN_PREVIEW: usize = 20;

/// chanscribe - resumable channel transcript extraction
#[derive(Parser, Debug)]
#[command(name = "chanscribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: discover chanscribe.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output directory (overrides config and CHANSCRIBE_OUTPUT)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract transcripts for the configured channel
    Extract {
        /// Process at most this many items
        #[arg(long)]
        max_items: Option<usize>,

        /// Items per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Ignore stored progress and start over
        #[arg(long)]
        no_resume: bool,
    },

    /// Enumerate the channel and analyze it without extracting
    Scan {
        /// Enumerate at most this many items
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Show stored extraction progress
    Status,

    /// Classify a title with the configured tables
    Classify {
        /// Item title
        title: String,

        /// Item description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Regenerate category and master indexes from the output tree
    Index,

    /// Check that every transcript sits where its title classifies it
    Validate,

    /// Move transcripts into their category directories
    Organize {
        /// Leave the indexes as they are
        #[arg(long)]
        no_index: bool,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(output) = self.output {
            config.output_dir = output;
        }

        match self.command {
            Commands::Extract {
                max_items,
                batch_size,
                no_resume,
            } => {
                if let Some(size) = batch_size {
                    config.extraction.batch_size = size;
                }
                if max_items.is_some() {
                    config.extraction.max_items = max_items;
                }
                if no_resume {
                    config.extraction.resume = false;
                }
                extract(&config).await
            }
            Commands::Scan { max_items } => scan(&config, max_items).await,
            Commands::Status => show_status(&config),
            Commands::Classify { title, description } => {
                classify(&config, &title, description.as_deref())
            }
            Commands::Index => write_indexes(&config),
            Commands::Validate => validate(&config),
            Commands::Organize { no_index } => organize(&config, !no_index),
            Commands::Config => show_config(&config),
        }
    }
}

/// Run the batch pipeline and print the final summary
async fn extract(config: &Config) -> Result<()> {
    config.validate()?;
    let channel = config.channel_ref()?;

    let classifier = Classifier::new(&config.classification);
    let source: Arc<dyn VideoSource> = Arc::new(YouTubeSource::from_api_key(
        config.api_key.as_deref(),
        config.extraction.request_timeout(),
    )?);
    let sink = Arc::new(FsSink::new(&config.output_dir, config.organize_by_category));

    let processor = BatchProcessor::new(
        &config.extraction,
        &classifier,
        source,
        sink,
        config.progress_store(),
    )
    .with_reports(ReportWriter::new(&config.output_dir));

    let summary = processor
        .run(&channel, config.extraction.max_items)
        .await
        .with_context(|| format!("Extraction of {} aborted", channel))?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run {}", summary.run_id);
    println!("{}", "-".repeat(60));
    println!("  Items enumerated: {}", summary.total_items);
    println!("  Skipped:          {}", summary.skipped);
    println!("  Processed:        {}", summary.processed());
    println!("  Succeeded:        {}", summary.succeeded);
    println!("  Failed:           {}", summary.failed);
    println!("  Success rate:     {:.1}%", summary.success_rate());

    if !summary.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &summary.failures {
            println!(
                "  {:<14} {} ({}: {})",
                failure.item_id, failure.title, failure.error_kind, failure.error
            );
        }
    }

    if let Some(ref archived) = summary.archived_progress {
        println!();
        println!("Progress archived to {}", archived.display());
    }
}

/// Enumerate only, list the first items, and print the discovery analysis
async fn scan(config: &Config, max_items: Option<usize>) -> Result<()> {
    let channel = config.channel_ref()?;
    let source =
        YouTubeSource::from_api_key(config.api_key.as_deref(), config.extraction.request_timeout())?;
    let classifier = Classifier::new(&config.classification);

    let items = source
        .list_items(&channel, max_items)
        .await
        .with_context(|| format!("Failed to enumerate {}", channel))?;

    if items.is_empty() {
        println!("No items found for {}", channel);
        return Ok(());
    }

    println!("{:<14} {:<22} {}", "ID", "PUBLISHED", "TITLE");
    println!("{}", "-".repeat(80));
    for item in items.iter().take(SCAN_PREVIEW) {
        println!(
            "{:<14} {:<22} {}",
            item.id,
            item.published_at.as_deref().unwrap_or("-"),
            truncate(&item.title, 60)
        );
    }
    if items.len() > SCAN_PREVIEW {
        println!("... and {} more", items.len() - SCAN_PREVIEW);
    }

    let analysis = ChannelAnalysis::from_items(&items, &classifier);
    println!();
    print!("{}", analysis.render());

    let written = ReportWriter::new(&config.output_dir).write_discovery(&items, &analysis)?;
    println!();
    println!("Item list: {}", written.items_csv.display());
    println!("Analysis:  {}", written.analysis.display());
    Ok(())
}

/// Show the active progress file
fn show_status(config: &Config) -> Result<()> {
    let store = config.progress_store();

    let state = match store.try_load() {
        Ok(Some(state)) => state,
        Ok(None) => {
            println!("No active progress at {}", store.path().display());
            return Ok(());
        }
        Err(e) => {
            println!("Progress file {} is unusable: {}", store.path().display(), e);
            println!("The next extraction will start fresh.");
            return Ok(());
        }
    };

    println!("Progress file: {}", store.path().display());
    println!("Run ID:        {}", state.run_id);
    println!("Started:       {}", state.started_at);
    println!("Completed:     {}", state.completed.len());
    println!("Failed:        {}", state.failed.len());
    println!(
        "Last batch:    {}",
        state
            .last_completed_batch
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Processed:     {}", state.total_processed);

    if !state.failed.is_empty() {
        println!("\nFailed items:");
        for id in &state.failed {
            println!("  {}", id);
        }
    }

    Ok(())
}

fn classify(config: &Config, title: &str, description: Option<&str>) -> Result<()> {
    let classification = Classifier::new(&config.classification).classify(title, description);
    println!("Category:    {}", classification.category);
    println!("Subcategory: {}", classification.subcategory);
    Ok(())
}

fn write_indexes(config: &Config) -> Result<()> {
    let written = ReportWriter::new(&config.output_dir).write_indexes()?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    let classifier = Classifier::new(&config.classification);
    let (report, path) = ReportWriter::new(&config.output_dir).validate_organization(&classifier)?;

    println!("Checked:            {}", report.total_files_checked);
    println!("Properly organized: {}", report.properly_organized);
    println!("Misplaced:          {}", report.misplaced_files.len());
    println!("Duplicates:         {}", report.duplicate_files.len());
    println!("Empty directories:  {}", report.empty_directories.len());
    println!("Unknown categories: {}", report.unknown_categories.len());
    println!("Unreadable:         {}", report.unreadable_files.len());

    for misplaced in report.misplaced_files.iter().take(SCAN_PREVIEW) {
        println!("  {} -> {}", misplaced.file, misplaced.suggested_location);
    }

    println!();
    if report.is_clean() {
        println!("Transcript tree is consistent.");
    } else if !report.misplaced_files.is_empty() {
        println!("Run `chanscribe organize` to re-file misplaced transcripts.");
    }
    println!("Report: {}", path.display());
    Ok(())
}

fn organize(config: &Config, reindex: bool) -> Result<()> {
    let classifier = Classifier::new(&config.classification);
    let writer = ReportWriter::new(&config.output_dir);
    let summary = writer.organize(&classifier)?;

    println!("Moved:          {}", summary.moved.len());
    println!("Already placed: {}", summary.already_placed);
    println!("Catalog rows:   {}", summary.catalog_updates);
    for path in &summary.conflicts {
        println!("  left in place (target exists): {}", path.display());
    }

    if reindex && !summary.moved.is_empty() {
        let written = writer.write_indexes()?;
        println!("Rewrote {} indexes", written.len());
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!(
        "Channel:     {}",
        config
            .channel
            .channel_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("Output:      {}", config.output_dir.display());
    println!(
        "Rate limit:  {}s between items, backoff base {}",
        config.extraction.rate_limit_seconds,
        config.extraction.backoff_base
    );
    println!();

    let yaml = serde_yaml::to_string(&config.redacted()).context("Failed to render config")?;
    print!("{}", yaml);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
