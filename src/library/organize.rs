//! Consistency checks and re-filing for the transcript tree.
//!
//! Both operations re-classify each transcript from the `Title:` line of its
//! header. Descriptions are not stored in transcripts, so a file placed by its
//! description alone can show up as misplaced.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::catalog::{Catalog, CATALOG_FILE_NAME};
use super::content::FLAT_DIR_NAME;
use super::report::ReportWriter;
use crate::core::Classifier;
use crate::domain::Classification;

/// Validation report written by `chanscribe validate`
pub const VALIDATION_FILE_NAME: &str = "organization_report.json";

/// A transcript outside the directory its title classifies into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisplacedFile {
    pub file: String,
    pub current_location: String,
    pub suggested_location: String,
}

/// Two transcripts with identical content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateFile {
    pub original: String,
    pub duplicate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadableFile {
    pub file: String,
    pub error: String,
}

/// Findings of a tree validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationReport {
    pub total_files_checked: usize,
    pub properly_organized: usize,
    pub misplaced_files: Vec<MisplacedFile>,
    pub duplicate_files: Vec<DuplicateFile>,
    pub empty_directories: Vec<String>,

    /// Top-level directories no classification can produce
    pub unknown_categories: Vec<String>,

    pub unreadable_files: Vec<UnreadableFile>,
    pub validated_at: DateTime<Utc>,
}

impl OrganizationReport {
    pub fn is_clean(&self) -> bool {
        self.misplaced_files.is_empty()
            && self.duplicate_files.is_empty()
            && self.empty_directories.is_empty()
            && self.unknown_categories.is_empty()
            && self.unreadable_files.is_empty()
    }
}

/// What a re-filing pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizeSummary {
    /// (from, to) for every moved transcript
    pub moved: Vec<(PathBuf, PathBuf)>,

    /// Transcripts already in their directory
    pub already_placed: usize,

    /// Transcripts left alone because the target name was taken
    pub conflicts: Vec<PathBuf>,

    /// Catalog rows whose path and classification were updated
    pub catalog_updates: usize,
}

/// Title from a transcript header
pub(crate) fn header_title(content: &str) -> Option<String> {
    content
        .lines()
        .take(5)
        .find_map(|line| line.strip_prefix("Title:"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Transcripts below `root`, skipping the reports at the top level
fn transcript_files(root: &Path) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> Result<()> {
        let mut entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                walk(&path, depth + 1, out)?;
            } else if depth > 0 && path.extension().and_then(|e| e.to_str()) == Some("txt") {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, 0, &mut files)?;
    Ok(files)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn title_or_stem(content: &str, path: &Path) -> String {
    header_title(content).unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    })
}

fn location(classification: &Classification) -> String {
    format!("{}/{}", classification.category, classification.subcategory)
}

/// Check placement, duplicates and directory hygiene below `root`
pub fn validate_tree(root: &Path, classifier: &Classifier) -> Result<OrganizationReport> {
    let mut report = OrganizationReport {
        total_files_checked: 0,
        properly_organized: 0,
        misplaced_files: Vec::new(),
        duplicate_files: Vec::new(),
        empty_directories: Vec::new(),
        unknown_categories: Vec::new(),
        unreadable_files: Vec::new(),
        validated_at: Utc::now(),
    };

    let labels = classifier.category_labels();
    let mut top_level: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("Failed to read directory: {}", root.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    top_level.sort();

    for dir in &top_level {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name != FLAT_DIR_NAME && !labels.contains(&name.as_str()) {
            report.unknown_categories.push(name);
        }

        let mut children: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        children.sort();

        if children.is_empty() {
            report.empty_directories.push(relative(root, dir));
        }
        for child in children.iter().filter(|c| c.is_dir()) {
            if fs::read_dir(child)?.next().is_none() {
                report.empty_directories.push(relative(root, child));
            }
        }
    }

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    for path in transcript_files(root)? {
        report.total_files_checked += 1;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.unreadable_files.push(UnreadableFile {
                    file: relative(root, &path),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let digest = hex::encode(Sha256::digest(&bytes));
        if let Some(original) = seen.get(&digest) {
            report.duplicate_files.push(DuplicateFile {
                original: relative(root, original),
                duplicate: relative(root, &path),
            });
        } else {
            seen.insert(digest, path.clone());
        }

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                report.unreadable_files.push(UnreadableFile {
                    file: relative(root, &path),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let expected = classifier.classify(&title_or_stem(&content, &path), None);
        let current = path
            .parent()
            .map(|p| relative(root, p))
            .unwrap_or_default();

        if current == location(&expected) {
            report.properly_organized += 1;
        } else {
            report.misplaced_files.push(MisplacedFile {
                file: relative(root, &path),
                current_location: current,
                suggested_location: location(&expected),
            });
        }
    }

    Ok(report)
}

/// Move every transcript below `root` into `<Category>/<Subcategory>/`
pub fn organize_tree(root: &Path, classifier: &Classifier) -> Result<OrganizeSummary> {
    let mut summary = OrganizeSummary::default();

    for path in transcript_files(root)? {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable transcript");
                continue;
            }
        };

        let expected = classifier.classify(&title_or_stem(&content, &path), None);
        let target_dir = root.join(&expected.category).join(&expected.subcategory);
        if path.parent() == Some(target_dir.as_path()) {
            summary.already_placed += 1;
            continue;
        }

        let Some(name) = path.file_name() else {
            continue;
        };
        let target = target_dir.join(name);
        if target.exists() {
            warn!(from = %path.display(), to = %target.display(), "Target exists, leaving file in place");
            summary.conflicts.push(path);
            continue;
        }

        fs::create_dir_all(&target_dir)
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;
        fs::rename(&path, &target)
            .with_context(|| format!("Failed to move {} to {}", path.display(), target.display()))?;
        debug!(from = %path.display(), to = %target.display(), "Moved transcript");

        if let Some(parent) = path.parent() {
            remove_empty_dirs(root, parent);
        }
        summary.moved.push((path, target));
    }

    Ok(summary)
}

/// Remove `dir` and its empty ancestors, stopping at `root`
fn remove_empty_dirs(root: &Path, dir: &Path) {
    let mut current = Some(dir);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        // Fails on a non-empty directory
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

impl ReportWriter {
    /// Validate the transcript tree and write the findings as JSON
    pub fn validate_organization(
        &self,
        classifier: &Classifier,
    ) -> Result<(OrganizationReport, PathBuf)> {
        let report = validate_tree(self.output_dir(), classifier)?;

        let path = self.output_dir().join(VALIDATION_FILE_NAME);
        fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            checked = report.total_files_checked,
            misplaced = report.misplaced_files.len(),
            duplicates = report.duplicate_files.len(),
            "Validated transcript tree"
        );
        Ok((report, path))
    }

    /// Re-file transcripts by their current classification and point the
    /// catalog at the new locations
    pub fn organize(&self, classifier: &Classifier) -> Result<OrganizeSummary> {
        let mut summary = organize_tree(self.output_dir(), classifier)?;

        let catalog_path = self.output_dir().join(CATALOG_FILE_NAME);
        if !summary.moved.is_empty() && catalog_path.exists() {
            let mut catalog = Catalog::read_csv(&catalog_path)?;

            for (from, to) in &summary.moved {
                let Some(name) = from.file_name() else {
                    continue;
                };
                let record = catalog.records.iter_mut().find(|r| {
                    r.output_path
                        .as_deref()
                        .and_then(|p| Path::new(p).file_name())
                        == Some(name)
                });
                if let Some(record) = record {
                    record.output_path = Some(to.display().to_string());
                    if let Some(sub) = to.parent() {
                        record.subcategory = file_name_string(sub);
                        if let Some(category) = sub.parent() {
                            record.category = file_name_string(category);
                        }
                    }
                    summary.catalog_updates += 1;
                }
            }

            catalog.write_csv(&catalog_path)?;
        }

        info!(
            moved = summary.moved.len(),
            already_placed = summary.already_placed,
            conflicts = summary.conflicts.len(),
            "Organized transcript tree"
        );
        Ok(summary)
    }
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
