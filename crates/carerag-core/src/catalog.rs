//! Document-level catalog of the knowledge base (one entry per source file).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::data_processor::{category_for, DataProcessor};
use crate::error::{Error, Result};
use crate::types::CatalogEntry;

pub struct CatalogBuilder<'a> {
    processor: &'a DataProcessor,
    language: String,
    reviewed_on: String,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(processor: &'a DataProcessor, language: impl Into<String>) -> Self {
        Self {
            processor,
            language: language.into(),
            reviewed_on: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }

    /// Overrides the review date stamped on every entry (`YYYY-MM-DD`).
    pub fn reviewed_on(mut self, date: chrono::NaiveDate) -> Self {
        self.reviewed_on = date.format("%Y-%m-%d").to_string();
        self
    }

    /// Entries for every non-excluded content file, sorted by path.
    pub fn build(&self, root: &Path) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = self
            .processor
            .list_content_files(root)?
            .into_iter()
            .map(|path| {
                let category = category_for(&path, root);
                CatalogEntry {
                    file_path: path.to_string_lossy().to_string(),
                    product_area: category.clone(),
                    category,
                    language: self.language.clone(),
                    requires_auth: false,
                    last_reviewed: self.reviewed_on.clone(),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        info!(files = entries.len(), root = %root.display(), "catalogued knowledge base");
        Ok(entries)
    }
}

pub fn category_counts(entries: &[CatalogEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.category.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn save_catalog(entries: &[CatalogEntry], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).map_err(|e| Error::Operation(e.to_string()))?;
    fs::write(path, json).map_err(|e| Error::io(path, e))
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| Error::Parse { path: path.to_path_buf(), message: e.to_string() })
}
