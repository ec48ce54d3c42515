//! Configuration loader and path helpers.
//!
//! Uses Figment to merge compiled-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_EMBEDDING__MODEL`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::Backend;

pub const DEFAULT_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Loads `config.toml` and the env-specific overlay from `dir`.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extracts and validates the typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub knowledge_base: KnowledgeBaseSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retriever: RetrieverSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseSettings {
    pub root: String,
    pub extensions: Vec<String>,
    pub excluded_folders: Vec<String>,
    pub excluded_files: Vec<String>,
    pub default_language: String,
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            root: "Knowledge_base".to_string(),
            extensions: vec!["md".to_string(), "json".to_string()],
            excluded_folders: vec!["savings".to_string()],
            excluded_files: vec![
                "flat_index.bin".to_string(),
                "metadata.json".to_string(),
                "catalog.json".to_string(),
                "embeddings_index.json".to_string(),
            ],
            default_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { max_chars: 400, overlap_chars: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model: DEFAULT_MODEL.to_string(), model_dir: None, max_len: 256, batch_size: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the artifacts; defaults to the knowledge-base root.
    pub dir: Option<String>,
    pub index_file: String,
    pub metadata_file: String,
    pub catalog_file: String,
    pub show_progress: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dir: None,
            index_file: "flat_index.bin".to_string(),
            metadata_file: "metadata.json".to_string(),
            catalog_file: "catalog.json".to_string(),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub backend: Backend,
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub deterministic_ties: bool,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self { backend: Backend::Persisted, top_k: 3, min_score: None, deterministic_ties: false }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be greater than 0".into()));
        }
        if c.overlap_chars >= c.max_chars {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                c.overlap_chars, c.max_chars
            )));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.model must not be empty".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be greater than 0".into()));
        }
        Ok(())
    }

    /// Re-anchors relative `knowledge_base.root`, `index.dir` and
    /// `embedding.model_dir` on `base` (the directory the config was read from).
    pub fn relative_to(mut self, base: &Path) -> Self {
        let anchor = |p: &str| resolve_with_base(base, p).to_string_lossy().into_owned();
        self.knowledge_base.root = anchor(&self.knowledge_base.root);
        self.index.dir = self.index.dir.as_deref().map(&anchor);
        self.embedding.model_dir = self.embedding.model_dir.as_deref().map(&anchor);
        self
    }

    pub fn kb_root(&self) -> PathBuf {
        expand_path(&self.knowledge_base.root)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        match &self.index.dir {
            Some(dir) => expand_path(dir),
            None => self.kb_root(),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.artifact_dir().join(&self.index.index_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.artifact_dir().join(&self.index.metadata_file)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.artifact_dir().join(&self.index.catalog_file)
    }

    /// Artifact names plus configured exclusions; never treated as content.
    pub fn excluded_file_names(&self) -> Vec<String> {
        let mut names = self.knowledge_base.excluded_files.clone();
        for artifact in [&self.index.index_file, &self.index.metadata_file, &self.index.catalog_file] {
            if !names.contains(artifact) {
                names.push(artifact.clone());
            }
        }
        names
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_knowledge_base_layout() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.max_chars, 400);
        assert_eq!(settings.chunking.overlap_chars, 50);
        assert_eq!(settings.retriever.top_k, 3);
        assert_eq!(settings.retriever.backend, Backend::Persisted);
        assert_eq!(settings.index_path(), PathBuf::from("Knowledge_base/flat_index.bin"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn toml_overrides_nested_keys() {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(
            r#"
            [embedding]
            model = "hash:64"
            [retriever]
            backend = "memory"
            min_score = 0.2
            [index]
            dir = "/tmp/kb-artifacts"
            "#,
        ));
        let settings = Config::from_figment(figment).settings().expect("settings");
        assert_eq!(settings.embedding.model, "hash:64");
        assert_eq!(settings.retriever.backend, Backend::Memory);
        assert_eq!(settings.retriever.min_score, Some(0.2));
        assert_eq!(settings.metadata_path(), PathBuf::from("/tmp/kb-artifacts/metadata.json"));
        // untouched sections keep their defaults
        assert_eq!(settings.chunking.max_chars, 400);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string("[chunking]\nmax_chars = 50\noverlap_chars = 50\n"));
        let err = Config::from_figment(figment).settings().expect_err("invalid");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn artifacts_are_always_excluded() {
        let mut settings = Settings::default();
        settings.knowledge_base.excluded_files.clear();
        settings.index.metadata_file = "chunks.json".into();
        let names = settings.excluded_file_names();
        assert!(names.contains(&"chunks.json".to_string()));
        assert!(names.contains(&"flat_index.bin".to_string()));
    }

    #[test]
    fn relative_paths_follow_the_config_directory() {
        let mut settings = Settings::default();
        settings.index.dir = Some("/var/lib/carerag".into());
        settings.embedding.model_dir = Some("models/minilm".into());
        let settings = settings.relative_to(Path::new("/srv/care"));
        assert_eq!(settings.kb_root(), PathBuf::from("/srv/care/Knowledge_base"));
        assert_eq!(settings.index_path(), PathBuf::from("/var/lib/carerag/flat_index.bin"));
        assert_eq!(settings.embedding.model_dir.as_deref(), Some("/srv/care/models/minilm"));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/kb");
        assert_eq!(resolve_with_base(base, "/etc/x"), PathBuf::from("/etc/x"));
        assert_eq!(resolve_with_base(base, "docs"), PathBuf::from("/srv/kb/docs"));
    }
}
