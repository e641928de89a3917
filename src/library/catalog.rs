//! Tabular catalog of processed items.
//!
//! One row per processed item, success or failure, written as CSV. A resumed
//! pass keeps the rows of earlier runs and replaces them by item id.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::{RecordStatus, ResultRecord};

/// Catalog file name inside the output directory
pub const CATALOG_FILE_NAME: &str = "master_catalog.csv";

/// Catalog of processed items
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub records: Vec<ResultRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = ResultRecord>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            catalog.add(record);
        }
        catalog
    }

    /// Add a row; a later row for the same item replaces the earlier one
    pub fn add(&mut self, record: ResultRecord) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.item_id == record.item_id) {
            *existing = record;
        } else {
            self.records.push(record);
        }
    }

    pub fn get(&self, item_id: &str) -> Option<&ResultRecord> {
        self.records.iter().find(|r| r.item_id == item_id)
    }

    pub fn with_status(&self, status: RecordStatus) -> Vec<&ResultRecord> {
        self.records.iter().filter(|r| r.status == status).collect()
    }

    /// Successful rows per category
    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.is_success()) {
            *counts.entry(record.category.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Successful rows per transcript language
    pub fn language_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.is_success()) {
            let language = record.language.as_deref().unwrap_or("unknown");
            *counts.entry(language).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_words(&self) -> usize {
        self.records.iter().map(|r| r.word_count).sum()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the catalog as CSV, atomically replacing any existing file
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            for record in &self.records {
                writer.serialize(record).with_context(|| {
                    format!("Failed to write catalog row for {}", record.item_id)
                })?;
            }
            writer.flush()?;
        }
        tmp.persist(path)
            .with_context(|| format!("Failed to replace catalog: {}", path.display()))?;

        Ok(())
    }

    /// Read a catalog written by [`Catalog::write_csv`]
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open catalog: {}", path.display()))?;

        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ResultRecord>, _>>()
            .context("Failed to parse catalog CSV")?;

        Ok(Self { records })
    }
}
