// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for pictag

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Vision model engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Image preparation
    #[serde(default)]
    pub image: ImageConfig,

    /// Batch tagging and the tagging log
    #[serde(default)]
    pub tagging: TaggingConfig,

    /// Renaming from the tagging log
    #[serde(default)]
    pub renamer: RenamerConfig,

    /// Gallery rendering
    #[serde(default)]
    pub gallery: GalleryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_engine_url")]
    pub url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImageConfig {
    /// Longest side of the image sent to the model, in pixels
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TaggingConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Inputs ending in one of these (case-insensitive) are never tagged
    #[serde(default = "default_extension_blacklist")]
    pub extension_blacklist: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RenamerConfig {
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
    #[serde(default)]
    pub collisions: CollisionPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GalleryConfig {
    /// Template file; the built-in template is used when absent
    #[serde(default)]
    pub template: Option<PathBuf>,
    #[serde(default = "default_gallery_output")]
    pub output: PathBuf,
}

/// What the renamer does when the clean filename is already taken.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Report the collision and the first free alternative, rename nothing
    #[default]
    Report,
    /// Rename to the first free `_N` alternative
    RenameWithSuffix,
}

// Default value functions
fn default_engine_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_model() -> String { "gpt-4o".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 5 }
fn default_backoff_base_ms() -> u64 { 1000 }
fn default_max_dimension() -> u32 { 512 }
fn default_log_path() -> PathBuf { PathBuf::from("image_tags.csv") }
fn default_journal_path() -> PathBuf { PathBuf::from("pictag_renames.jsonl") }
fn default_gallery_output() -> PathBuf { PathBuf::from("gallery.html") }

fn default_extension_blacklist() -> Vec<String> {
    [".mp3", ".mp4", ".pdf", ".docx", ".xlsx", ".csv", ".zip", ".gz", ".txt"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
        }
    }
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            extension_blacklist: default_extension_blacklist(),
        }
    }
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            journal_path: default_journal_path(),
            collisions: CollisionPolicy::default(),
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            template: None,
            output: default_gallery_output(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::PictagError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::Result<()> {
        if self.image.max_dimension == 0 {
            return Err(crate::PictagError::Config(
                "image.max_dimension must be at least 1".to_string(),
            ));
        }
        if self.engine.max_tokens == 0 {
            return Err(crate::PictagError::Config(
                "engine.max_tokens must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.image.max_dimension, 512);
        assert_eq!(config.engine.temperature, 0.0);
        assert_eq!(config.renamer.collisions, CollisionPolicy::Report);
        assert!(config.tagging.extension_blacklist.contains(&".pdf".to_string()));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pictag.json");
        std::fs::write(
            &path,
            r#"{"engine": {"model": "gpt-4o-mini"}, "renamer": {"collisions": "rename_with_suffix"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.engine.model, "gpt-4o-mini");
        assert_eq!(config.engine.max_tokens, 1024);
        assert_eq!(config.renamer.collisions, CollisionPolicy::RenameWithSuffix);
        assert_eq!(config.tagging.log_path, PathBuf::from("image_tags.csv"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pictag.json");
        let mut config = AppConfig::default();
        config.image.max_dimension = 256;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.image.max_dimension, 256);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pictag.json");
        std::fs::write(&path, r#"{"image": {"max_dimension": 0}}"#).unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
