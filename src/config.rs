// File: src/config.rs
//! Runtime configuration.
//!
//! Resolution order: CLI arguments → environment variables → defaults. The
//! command-line tool reads the `ENV_*` variables through its flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable names.
pub const ENV_STORE_PATH: &str = "SNIFFLE_STORE";
pub const ENV_DICTIONARY_PATH: &str = "SNIFFLE_DICTIONARY";
pub const ENV_CONCURRENCY: &str = "SNIFFLE_CONCURRENCY";

/// Default snapshot file, relative to the working directory.
pub const DEFAULT_STORE_FILENAME: &str = "sniffle.db";

/// Examples in flight at once during import and test runs.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Pseudo-count for tokens never seen in a category. Lower values punish
/// missing or unusual tokens harder.
pub const DEFAULT_SMOOTHING: f64 = 0.001;

/// Top scores below this are discarded as unknown.
pub const DEFAULT_THRESHOLD: f64 = 0.0;

/// Scoring parameters shared by every classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub smoothing: f64,
    pub threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            smoothing: DEFAULT_SMOOTHING,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniffleConfig {
    /// Snapshot file of the count store.
    pub store_path: PathBuf,
    /// Compiled phrase dictionary; the built-in one when absent.
    pub dictionary_path: Option<PathBuf>,
    pub classifier: ClassifierConfig,
    pub concurrency: usize,
}

impl Default for SniffleConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILENAME),
            dictionary_path: None,
            classifier: ClassifierConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SniffleConfig {
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_dictionary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dictionary_path = Some(path.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.classifier.threshold = threshold;
        self
    }
}
