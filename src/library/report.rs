//! Run reports, transcript indexes and channel discovery analysis.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use super::catalog::{Catalog, CATALOG_FILE_NAME};
use super::organize::header_title;
use crate::core::{format_seconds, Classifier, RunSummary};
use crate::domain::{FailureRecord, Item};

pub const SUMMARY_FILE_NAME: &str = "extraction_summary.txt";
pub const FAILURES_FILE_NAME: &str = "failed_items.json";
pub const MASTER_INDEX_FILE_NAME: &str = "MASTER_INDEX.md";
pub const DISCOVERY_CSV_FILE_NAME: &str = "all_items.csv";
pub const DISCOVERY_JSON_FILE_NAME: &str = "all_items.json";
pub const ANALYSIS_FILE_NAME: &str = "content_analysis.json";

/// Files written for one run
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub catalog: PathBuf,
    pub failures: PathBuf,
    pub summary: PathBuf,
}

/// Files written by a channel scan
#[derive(Debug, Clone)]
pub struct DiscoveryPaths {
    pub items_csv: PathBuf,
    pub items_json: PathBuf,
    pub analysis: PathBuf,
}

/// One row of the discovered item list
#[derive(Debug, Serialize)]
struct DiscoveryRow<'a> {
    video_id: &'a str,
    title: &'a str,
    published_at: Option<&'a str>,
    duration: Option<&'a str>,
    duration_seconds: u64,
    view_count: u64,
    like_count: u64,
    comment_count: u64,
    url: &'a str,
}

impl<'a> From<&'a Item> for DiscoveryRow<'a> {
    fn from(item: &'a Item) -> Self {
        Self {
            video_id: &item.id,
            title: &item.title,
            published_at: item.published_at.as_deref(),
            duration: item.duration.as_deref(),
            duration_seconds: item.duration_seconds(),
            view_count: item.stats.view_count,
            like_count: item.stats.like_count,
            comment_count: item.stats.comment_count,
            url: &item.url,
        }
    }
}

/// Writes reports into the output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn paths(&self) -> ReportPaths {
        ReportPaths {
            catalog: self.output_dir.join(CATALOG_FILE_NAME),
            failures: self.output_dir.join(FAILURES_FILE_NAME),
            summary: self.output_dir.join(SUMMARY_FILE_NAME),
        }
    }

    /// Catalog and failure list left by earlier runs of an unfinished pass.
    ///
    /// Missing files give empty results. Unreadable ones are logged and
    /// treated as missing.
    pub fn load_previous(&self) -> (Catalog, Vec<FailureRecord>) {
        let paths = self.paths();

        let catalog = if paths.catalog.exists() {
            Catalog::read_csv(&paths.catalog).unwrap_or_else(|e| {
                warn!(path = %paths.catalog.display(), error = %e, "Ignoring unreadable catalog");
                Catalog::new()
            })
        } else {
            Catalog::new()
        };

        let failures = if paths.failures.exists() {
            read_failures(&paths.failures).unwrap_or_else(|e| {
                warn!(path = %paths.failures.display(), error = %e, "Ignoring unreadable failure list");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        (catalog, failures)
    }

    /// Replace the catalog and failure list
    pub fn write_catalog(&self, catalog: &Catalog, failures: &[FailureRecord]) -> Result<ReportPaths> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir.display())
        })?;

        let paths = self.paths();
        catalog.write_csv(&paths.catalog)?;

        let content = serde_json::to_string_pretty(failures)?;
        fs::write(&paths.failures, content)
            .with_context(|| format!("Failed to write {}", paths.failures.display()))?;

        Ok(paths)
    }

    /// Write the catalog, failure list and narrative summary for a run
    pub fn write_run(&self, summary: &RunSummary) -> Result<ReportPaths> {
        let paths = self.write_catalog(&summary.catalog, &summary.pass_failures)?;

        fs::write(&paths.summary, render_summary(summary))
            .with_context(|| format!("Failed to write {}", paths.summary.display()))?;

        info!(dir = %self.output_dir.display(), "Wrote run reports");
        Ok(paths)
    }

    /// Write the enumerated item list and its analysis
    pub fn write_discovery(&self, items: &[Item], analysis: &ChannelAnalysis) -> Result<DiscoveryPaths> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir.display())
        })?;

        let paths = DiscoveryPaths {
            items_csv: self.output_dir.join(DISCOVERY_CSV_FILE_NAME),
            items_json: self.output_dir.join(DISCOVERY_JSON_FILE_NAME),
            analysis: self.output_dir.join(ANALYSIS_FILE_NAME),
        };

        let mut writer = csv::Writer::from_path(&paths.items_csv)
            .with_context(|| format!("Failed to create {}", paths.items_csv.display()))?;
        for item in items {
            writer.serialize(DiscoveryRow::from(item))?;
        }
        writer.flush()?;

        fs::write(&paths.items_json, serde_json::to_string_pretty(items)?)
            .with_context(|| format!("Failed to write {}", paths.items_json.display()))?;
        fs::write(&paths.analysis, serde_json::to_string_pretty(analysis)?)
            .with_context(|| format!("Failed to write {}", paths.analysis.display()))?;

        info!(items = items.len(), dir = %self.output_dir.display(), "Wrote discovery report");
        Ok(paths)
    }

    /// Regenerate `<Category>_INDEX.md` files and the master index from the
    /// transcript tree. Returns the paths written.
    pub fn write_indexes(&self) -> Result<Vec<PathBuf>> {
        let tree = scan_tree(&self.output_dir)?;
        let generated = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut written = Vec::new();

        for category in &tree {
            let path = self
                .output_dir
                .join(&category.name)
                .join(format!("{}_INDEX.md", category.name));

            let mut doc = String::new();
            let _ = writeln!(doc, "# {} - Transcript Index\n", category.name);
            let _ = writeln!(doc, "Generated: {}\n", generated);

            for sub in &category.subcategories {
                let _ = writeln!(doc, "## {} ({} files)\n", sub.name, sub.files.len());
                for file in &sub.files {
                    let _ = writeln!(doc, "- **{}**", file.title);
                    let _ = writeln!(doc, "  - File: `{}`", file.file_name);
                    let _ = writeln!(doc, "  - Size: {:.1} KB", file.size_bytes as f64 / 1024.0);
                    let _ = writeln!(doc, "  - Path: `{}/{}`\n", sub.name, file.file_name);
                }
            }
            let _ = writeln!(
                doc,
                "\n---\n**Total Files in {}: {}**",
                category.name,
                category.file_count()
            );

            fs::write(&path, doc).with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }

        let master = self.output_dir.join(MASTER_INDEX_FILE_NAME);
        fs::write(&master, render_master_index(&tree, &generated.to_string()))
            .with_context(|| format!("Failed to write {}", master.display()))?;
        written.push(master);

        info!(files = written.len(), "Wrote transcript indexes");
        Ok(written)
    }
}

fn read_failures(path: &Path) -> Result<Vec<FailureRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Narrative summary of a run.
///
/// Counts describe this run. Breakdowns and the failure list cover the whole
/// pass, including batches committed by earlier runs.
pub fn render_summary(summary: &RunSummary) -> String {
    let catalog = &summary.catalog;
    let processed = summary.processed();

    let mut out = String::new();
    let _ = writeln!(out, "CHANNEL TRANSCRIPT EXTRACTION SUMMARY");
    let _ = writeln!(out, "{}\n", "=".repeat(60));
    let _ = writeln!(
        out,
        "Extraction completed: {}",
        summary.finished_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Run: {}", summary.run_id);
    let _ = writeln!(out, "Items enumerated: {}", summary.total_items);
    let _ = writeln!(out, "Skipped (already done): {}", summary.skipped);
    let _ = writeln!(out, "Items processed: {}", processed);
    let _ = writeln!(out, "Successful extractions: {}", summary.succeeded);
    let _ = writeln!(out, "Failed extractions: {}", summary.failed);
    let _ = writeln!(out, "Success rate: {:.1}%", summary.success_rate());
    let _ = writeln!(out, "Catalog rows (whole pass): {}\n", catalog.len());

    let _ = writeln!(out, "CATEGORY BREAKDOWN:");
    let _ = writeln!(out, "{}", "-".repeat(30));
    for (category, count) in catalog.category_counts() {
        let _ = writeln!(out, "{}: {} items", category, count);
    }

    let _ = writeln!(out, "\nLANGUAGE BREAKDOWN:");
    let _ = writeln!(out, "{}", "-".repeat(30));
    for (language, count) in catalog.language_counts() {
        let _ = writeln!(out, "{}: {} items", language, count);
    }

    let total_words = catalog.total_words();
    let with_words = catalog
        .records
        .iter()
        .filter(|r| r.is_success() && r.word_count > 0)
        .count();
    let average = if with_words > 0 {
        total_words / with_words
    } else {
        0
    };
    let _ = writeln!(out, "\nCONTENT STATISTICS:");
    let _ = writeln!(out, "{}", "-".repeat(30));
    let _ = writeln!(out, "Total words extracted: {}", total_words);
    let _ = writeln!(out, "Average words per item: {}", average);

    if !summary.pass_failures.is_empty() {
        let _ = writeln!(out, "\nFAILED ITEMS:");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for failure in &summary.pass_failures {
            let _ = writeln!(
                out,
                "- {} ({}): {}",
                failure.title, failure.item_id, failure.error
            );
        }
    }

    out
}

#[derive(Debug)]
struct IndexedFile {
    title: String,
    file_name: String,
    size_bytes: u64,
}

#[derive(Debug)]
struct SubcategoryDir {
    name: String,
    files: Vec<IndexedFile>,
}

#[derive(Debug)]
struct CategoryDir {
    name: String,
    subcategories: Vec<SubcategoryDir>,
}

impl CategoryDir {
    fn file_count(&self) -> usize {
        self.subcategories.iter().map(|s| s.files.len()).sum()
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Walk `<root>/<category>/<subcategory>/*.txt`
fn scan_tree(root: &Path) -> Result<Vec<CategoryDir>> {
    let mut categories = Vec::new();

    for category in sorted_entries(root)? {
        if !category.file_type()?.is_dir() {
            continue;
        }

        let mut subcategories = Vec::new();
        for sub in sorted_entries(&category.path())? {
            if !sub.file_type()?.is_dir() {
                continue;
            }

            let mut files = Vec::new();
            for file in sorted_entries(&sub.path())? {
                let path = file.path();
                if !file.file_type()?.is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("txt")
                {
                    continue;
                }
                files.push(IndexedFile {
                    title: read_title(&path),
                    file_name: file.file_name().to_string_lossy().to_string(),
                    size_bytes: file.metadata()?.len(),
                });
            }

            if !files.is_empty() {
                subcategories.push(SubcategoryDir {
                    name: sub.file_name().to_string_lossy().to_string(),
                    files,
                });
            }
        }

        if !subcategories.is_empty() {
            categories.push(CategoryDir {
                name: category.file_name().to_string_lossy().to_string(),
                subcategories,
            });
        }
    }

    Ok(categories)
}

/// Title from a transcript header, or the file stem
fn read_title(path: &Path) -> String {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| header_title(&content))
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        })
}

fn render_master_index(tree: &[CategoryDir], generated: &str) -> String {
    let total: usize = tree.iter().map(CategoryDir::file_count).sum();
    let total_bytes: u64 = tree
        .iter()
        .flat_map(|c| c.subcategories.iter())
        .flat_map(|s| s.files.iter())
        .map(|f| f.size_bytes)
        .sum();

    let mut by_subcategory: BTreeMap<&str, usize> = BTreeMap::new();
    for sub in tree.iter().flat_map(|c| c.subcategories.iter()) {
        *by_subcategory.entry(sub.name.as_str()).or_insert(0) += sub.files.len();
    }

    let mut doc = String::new();
    let _ = writeln!(doc, "# Master Transcript Index\n");
    let _ = writeln!(doc, "Generated: {}\n", generated);
    let _ = writeln!(doc, "## Summary Statistics\n");
    let _ = writeln!(doc, "- **Total Files**: {}", total);
    let _ = writeln!(
        doc,
        "- **Total Size**: {:.1} MB",
        total_bytes as f64 / (1024.0 * 1024.0)
    );
    let _ = writeln!(doc, "- **Categories Covered**: {}\n", tree.len());

    let _ = writeln!(doc, "## Category Breakdown\n");
    for category in tree {
        let _ = writeln!(doc, "### {} ({} files)\n", category.name, category.file_count());
        for sub in &category.subcategories {
            let _ = writeln!(doc, "- **{}**: {} files", sub.name, sub.files.len());
        }
        let _ = writeln!(doc, "- Index: [{0}_INDEX.md]({0}/{0}_INDEX.md)\n", category.name);
    }

    let _ = writeln!(doc, "## Subcategory Summary\n");
    for (name, count) in by_subcategory {
        let _ = writeln!(doc, "- **{}**: {} files", name, count);
    }

    doc
}

/// Pre-extraction analysis of an enumerated channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAnalysis {
    pub total_items: usize,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    pub total_seconds: u64,
    pub total_views: u64,
    pub average_views: u64,
    pub min_views: u64,
    pub max_views: u64,
    pub categories: BTreeMap<String, usize>,
    pub subcategories: BTreeMap<String, usize>,
}

impl ChannelAnalysis {
    pub fn from_items(items: &[Item], classifier: &Classifier) -> Self {
        let published = || items.iter().filter_map(|i| i.published_at.clone());
        let views: Vec<u64> = items.iter().map(|i| i.stats.view_count).collect();
        let total_views: u64 = views.iter().sum();

        let mut categories = BTreeMap::new();
        let mut subcategories = BTreeMap::new();
        for item in items {
            let c = classifier.classify(&item.title, Some(item.description.as_str()));
            *categories.entry(c.category).or_insert(0) += 1;
            *subcategories.entry(c.subcategory).or_insert(0) += 1;
        }

        Self {
            total_items: items.len(),
            // RFC 3339 timestamps in UTC order lexically
            earliest: published().min(),
            latest: published().max(),
            total_seconds: items.iter().map(Item::duration_seconds).sum(),
            total_views,
            average_views: if items.is_empty() {
                0
            } else {
                total_views / items.len() as u64
            },
            min_views: views.iter().copied().min().unwrap_or(0),
            max_views: views.iter().copied().max().unwrap_or(0),
            categories,
            subcategories,
        }
    }

    pub fn total_hours(&self) -> f64 {
        self.total_seconds as f64 / 3600.0
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Items: {}", self.total_items);
        let _ = writeln!(
            out,
            "Published: {} .. {}",
            self.earliest.as_deref().unwrap_or("unknown"),
            self.latest.as_deref().unwrap_or("unknown")
        );
        let _ = writeln!(
            out,
            "Total duration: {:.1} hours ({})",
            self.total_hours(),
            format_seconds(self.total_seconds)
        );
        let _ = writeln!(
            out,
            "Views: total {}, average {}, min {}, max {}",
            self.total_views, self.average_views, self.min_views, self.max_views
        );

        let _ = writeln!(out, "\nCategories:");
        for (name, count) in &self.categories {
            let _ = writeln!(out, "  {:<20} {}", name, count);
        }
        let _ = writeln!(out, "\nSeries:");
        for (name, count) in &self.subcategories {
            let _ = writeln!(out, "  {:<20} {}", name, count);
        }
        out
    }
}
