//! Knowledge-base discovery and document loading.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::types::{Document, SourceValue};

/// Category used for files sitting directly under the knowledge-base root.
pub const ROOT_CATEGORY: &str = "general";

/// Documents loaded from a directory plus the files that were skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone)]
pub struct DataProcessor {
    extensions: Vec<String>,
    excluded_folders: Vec<String>,
    excluded_files: Vec<String>,
    default_language: String,
}

impl Default for DataProcessor {
    fn default() -> Self { Self::from_settings(&Settings::default()) }
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            extensions: settings.knowledge_base.extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
            excluded_folders: settings.knowledge_base.excluded_folders.clone(),
            excluded_files: settings.excluded_file_names(),
            default_language: settings.knowledge_base.default_language.clone(),
        }
    }

    /// Loads every content file under `data_dir`.
    ///
    /// A missing root is fatal; a file that cannot be read or parsed is
    /// reported in `skipped` and the scan continues.
    pub fn process_directory(&self, data_dir: &Path) -> Result<LoadReport> {
        self.process_directory_limited(data_dir, usize::MAX)
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<LoadReport> {
        let mut files = self.list_content_files(data_dir)?;
        if files.is_empty() {
            warn!(root = %data_dir.display(), "no content files found");
            return Ok(LoadReport::default());
        }
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited to first files");
        }
        let mut report = LoadReport::default();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(path = %file_path.display(), "loading file {}/{}", file_index + 1, files.len());
            match self.load_document(file_path, data_dir) {
                Ok(document) => report.documents.push(document),
                Err(e) => {
                    warn!(path = %file_path.display(), error = %e, "skipping file");
                    report.skipped.push((file_path.clone(), e.to_string()));
                }
            }
        }
        info!(loaded = report.documents.len(), skipped = report.skipped.len(), root = %data_dir.display(), "loaded knowledge base");
        Ok(report)
    }

    /// Reads and parses one file; the body type follows the extension.
    pub fn load_document(&self, file_path: &Path, data_dir: &Path) -> Result<Document> {
        let content = read_file_content(file_path)?;
        let extension = file_path.extension().and_then(|s| s.to_str()).map(str::to_lowercase);
        let document = match extension.as_deref() {
            Some("json") => {
                let value: serde_json::Value = serde_json::from_str(&content)
                    .map_err(|e| Error::Parse { path: file_path.to_path_buf(), message: e.to_string() })?;
                Document::structured(file_path, SourceValue::from(value))
            }
            Some("md" | "markdown") => Document::markdown(file_path, content),
            _ => Document::plain(file_path, content),
        };
        Ok(document
            .with_category(category_for(file_path, data_dir))
            .with_language(self.default_language.clone()))
    }

    /// Sorted list of files with a content extension that are not excluded.
    pub fn list_content_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("knowledge base directory {}", root.display())));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let has_extension = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
            if has_extension && !self.is_excluded(path, root) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn is_excluded(&self, path: &Path, root: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if let Some(parent) = relative.parent() {
            let in_excluded_folder = parent
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .any(|part| self.excluded_folders.iter().any(|f| f == part));
            if in_excluded_folder {
                return true;
            }
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return true };
        self.excluded_files.iter().any(|f| f == name)
            || name.starts_with('.')
            || name.ends_with('~')
            || name.ends_with(".bak")
            || name.ends_with(".tmp")
    }
}

/// Immediate parent folder name, or `general` for files directly under the root.
pub fn category_for(file_path: &Path, data_dir: &Path) -> String {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    relative
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map_or_else(|| ROOT_CATEGORY.to_string(), str::to_string)
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(file_path).map_err(|e| Error::io(file_path, e))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}
