//! TOML configuration.
//!
//! Holds scan filters plus defaults for the `dedupe` and `organize` commands.
//! Every key is optional:
//!
//! ```toml
//! [scan]
//! include_hidden = false
//!
//! [scan.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["**/node_modules/**"]
//! extensions = ["tmp", "part"]
//! regex = []
//!
//! [scan.include]
//! patterns = []
//!
//! [dedupe]
//! parallel = true
//! workers = 0
//!
//! [organize]
//! rule = "extension"
//! cleanup = false
//! ```

use crate::rules::RuleKind;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_NAME: &str = ".dirsort.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid configuration in {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlob(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("IO error reading configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanSettings,
    pub dedupe: DedupeSettings,
    pub organize: OrganizeSettings,
}

/// Which files the scanner yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Yield files whose name starts with a dot.
    pub include_hidden: bool,
    pub exclude: ExcludeRules,
    /// Whitelist; a match here wins over every exclude rule.
    pub include: IncludeRules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    pub filenames: Vec<String>,
    pub patterns: Vec<String>,
    /// Compared case-insensitively, without the leading dot.
    pub extensions: Vec<String>,
    /// Matched against the file name only.
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeRules {
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeSettings {
    /// Hash on a worker pool instead of the calling thread.
    pub parallel: bool,
    /// Pool size; 0 means the host's available parallelism.
    pub workers: usize,
}

impl Default for DedupeSettings {
    fn default() -> Self {
        Self {
            parallel: true,
            workers: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSettings {
    pub rule: RuleKind,
    /// Remove directories left empty after organizing.
    pub cleanup: bool,
}

impl Config {
    /// Loads configuration, falling back through the usual locations.
    ///
    /// 1. `config_path`, if given (must exist)
    /// 2. `.dirsort.toml` in the current directory
    /// 3. `~/.config/dirsort/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Compiles the scan filters for matching.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.scan)
    }
}

/// Scan filters with every glob and regex parsed once.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    include_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(settings: &ScanSettings) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Pattern::new(p).map_err(|_| ConfigError::InvalidGlob(p.clone())))
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = settings
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_hidden: settings.include_hidden,
            exclude_filenames: settings.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: settings
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&settings.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&settings.include.patterns)?,
        })
    }

    /// Whether the scanner should yield this file.
    ///
    /// Order: include patterns, hidden files, exact names, extensions,
    /// exclude globs, regexes. The first rule that matches decides.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return true;
        }

        if !self.include_hidden && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}
