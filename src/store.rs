// File: src/store.rs
//! The count store: per-category example and token counts plus the label map.
//!
//! Every mutation is a single transaction. [`MemoryStore`] holds one write lock
//! for the whole of a transaction, so readers never observe an example count
//! without its token counts or a label without its aggregates.

use crate::core::types::Attribute;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Known labels of one raw string, by attribute.
pub type LabelSet = BTreeMap<Attribute, String>;

/// Transactional storage for classifier counts.
///
/// Implementations must apply each train and untrain transaction atomically
/// with respect to every other call on the same store.
pub trait CountStore: Send + Sync {
    /// Example counts of every category with at least one example, in
    /// category order.
    fn example_counts(&self, attribute: Attribute) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Occurrence counts of `tokens` in one category. Unseen tokens map to 0.
    fn token_counts(
        &self,
        attribute: Attribute,
        category: &str,
        tokens: &[String],
    ) -> Result<HashMap<String, u64>, StoreError>;

    /// Number of labeled strings, across all attributes.
    fn total_example_count(&self) -> Result<u64, StoreError>;

    /// Category currently recorded for `raw` under `attribute`.
    fn label(&self, raw: &str, attribute: Attribute) -> Result<Option<String>, StoreError>;

    /// Records `raw` as an example of `category`. If `raw` already carries a
    /// label for `attribute`, that label's counts are reverted first.
    fn apply_train(
        &self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> Result<(), StoreError>;

    /// Removes `raw` from `category`. Does nothing, and returns false, unless
    /// `category` is the label currently recorded for `raw`.
    fn apply_untrain(
        &self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> Result<bool, StoreError>;

    /// Resolves the wildcard category selector for `raw`.
    fn resolve_wildcard_label(
        &self,
        raw: &str,
        attribute: Attribute,
    ) -> Result<Option<String>, StoreError> {
        self.label(raw, attribute)
    }

    /// Everything one score calculation needs, read as a single consistent
    /// view: the global total plus, for every category with examples, its
    /// example count and the counts of `tokens`.
    fn scoring_snapshot(
        &self,
        attribute: Attribute,
        tokens: &[String],
    ) -> Result<ScoringSnapshot, StoreError>;

    /// Snapshot of the whole label map.
    fn labels(&self) -> Result<BTreeMap<String, LabelSet>, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Summary numbers for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub labeled_strings: u64,
    /// Categories with at least one example.
    pub categories: BTreeMap<Attribute, usize>,
    pub examples: BTreeMap<Attribute, u64>,
}

/// Counts read by one score calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringSnapshot {
    /// Number of labeled strings, across all attributes.
    pub total_examples: u64,
    /// Categories with at least one example, in category order.
    pub categories: Vec<CategorySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySnapshot {
    pub category: String,
    pub examples: u64,
    /// Counts of the requested tokens. Unseen tokens map to 0.
    pub token_counts: HashMap<String, u64>,
}

/// Aggregate counts of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub examples: u64,
    pub tokens: HashMap<String, u64>,
}

/// The complete persisted state of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    categories: BTreeMap<Attribute, BTreeMap<String, CategoryCounts>>,
    labels: HashMap<String, LabelSet>,
}

impl CategoryCounts {
    fn lookup(&self, tokens: &[String]) -> HashMap<String, u64> {
        tokens
            .iter()
            .map(|token| (token.clone(), self.tokens.get(token).copied().unwrap_or(0)))
            .collect()
    }
}

impl StoreState {
    pub fn category(&self, attribute: Attribute, category: &str) -> Option<&CategoryCounts> {
        self.categories.get(&attribute)?.get(category)
    }

    /// Number of raw strings with at least one label.
    pub fn labeled_strings(&self) -> u64 {
        self.labels.len() as u64
    }

    fn active_categories(
        &self,
        attribute: Attribute,
    ) -> impl Iterator<Item = (&String, &CategoryCounts)> {
        self.categories
            .get(&attribute)
            .into_iter()
            .flatten()
            .filter(|(_, counts)| counts.examples > 0)
    }

    /// Train transaction: records `raw` under `category`, reverting any label
    /// it already had for `attribute`.
    pub(crate) fn train(&mut self, attribute: Attribute, category: &str, raw: &str, tokens: &[String]) {
        if let Some(previous) = self.set_label(raw, attribute, category) {
            tracing::debug!(%attribute, raw, previous = %previous, "replacing existing label");
            self.remove_example(attribute, &previous, tokens);
        }
        self.add_example(attribute, category, tokens);
        tracing::debug!(%attribute, category, raw, tokens = tokens.len(), "train applied");
    }

    /// Untrain transaction. Applies only when `category` is the recorded label.
    pub(crate) fn untrain(
        &mut self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> bool {
        let recorded = self.labels.get(raw).and_then(|labels| labels.get(&attribute));
        if recorded.map(String::as_str) != Some(category) {
            tracing::debug!(%attribute, category, raw, "untrain skipped, label not recorded");
            return false;
        }

        self.remove_example(attribute, category, tokens);
        self.clear_label(raw, attribute);
        tracing::debug!(%attribute, category, raw, tokens = tokens.len(), "untrain applied");
        true
    }

    fn add_example(&mut self, attribute: Attribute, category: &str, tokens: &[String]) {
        let counts = self
            .categories
            .entry(attribute)
            .or_default()
            .entry(category.to_string())
            .or_default();

        counts.examples += 1;
        for token in distinct(tokens) {
            *counts.tokens.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    fn remove_example(&mut self, attribute: Attribute, category: &str, tokens: &[String]) {
        let Some(counts) = self
            .categories
            .get_mut(&attribute)
            .and_then(|categories| categories.get_mut(category))
        else {
            tracing::warn!(%attribute, category, "untrain of a category with no counts");
            return;
        };

        match counts.examples.checked_sub(1) {
            Some(examples) => counts.examples = examples,
            None => tracing::warn!(%attribute, category, "example count already zero"),
        }

        for token in distinct(tokens) {
            match counts.tokens.get_mut(token) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    counts.tokens.remove(token);
                }
                None => tracing::warn!(%attribute, category, token, "token count already zero"),
            }
        }
    }

    fn set_label(&mut self, raw: &str, attribute: Attribute, category: &str) -> Option<String> {
        self.labels
            .entry(raw.to_string())
            .or_default()
            .insert(attribute, category.to_string())
    }

    fn clear_label(&mut self, raw: &str, attribute: Attribute) {
        if let Some(labels) = self.labels.get_mut(raw) {
            labels.remove(&attribute);
            if labels.is_empty() {
                self.labels.remove(raw);
            }
        }
    }
}

fn distinct(tokens: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .map(String::as_str)
        .filter(move |token| seen.insert(*token))
}

/// Process-local count store guarded by a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self { state: RwLock::new(state) }
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> Result<StoreState, StoreError> {
        Ok(self.read()?.clone())
    }

    pub(crate) fn replace(&self, state: StoreState) -> Result<(), StoreError> {
        *self.write()? = state;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl CountStore for MemoryStore {
    fn example_counts(&self, attribute: Attribute) -> Result<BTreeMap<String, u64>, StoreError> {
        let state = self.read()?;
        Ok(state
            .active_categories(attribute)
            .map(|(category, counts)| (category.clone(), counts.examples))
            .collect())
    }

    fn token_counts(
        &self,
        attribute: Attribute,
        category: &str,
        tokens: &[String],
    ) -> Result<HashMap<String, u64>, StoreError> {
        let state = self.read()?;
        Ok(match state.category(attribute, category) {
            Some(counts) => counts.lookup(tokens),
            None => tokens.iter().map(|token| (token.clone(), 0)).collect(),
        })
    }

    fn total_example_count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.labeled_strings())
    }

    fn label(&self, raw: &str, attribute: Attribute) -> Result<Option<String>, StoreError> {
        Ok(self
            .read()?
            .labels
            .get(raw)
            .and_then(|labels| labels.get(&attribute))
            .cloned())
    }

    fn apply_train(
        &self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> Result<(), StoreError> {
        self.write()?.train(attribute, category, raw, tokens);
        Ok(())
    }

    fn apply_untrain(
        &self,
        attribute: Attribute,
        category: &str,
        raw: &str,
        tokens: &[String],
    ) -> Result<bool, StoreError> {
        Ok(self.write()?.untrain(attribute, category, raw, tokens))
    }

    fn scoring_snapshot(
        &self,
        attribute: Attribute,
        tokens: &[String],
    ) -> Result<ScoringSnapshot, StoreError> {
        let state = self.read()?;
        let categories = state
            .active_categories(attribute)
            .map(|(category, counts)| CategorySnapshot {
                category: category.clone(),
                examples: counts.examples,
                token_counts: counts.lookup(tokens),
            })
            .collect();

        Ok(ScoringSnapshot {
            total_examples: state.labeled_strings(),
            categories,
        })
    }

    fn labels(&self) -> Result<BTreeMap<String, LabelSet>, StoreError> {
        let state = self.read()?;
        Ok(state
            .labels
            .iter()
            .map(|(raw, labels)| (raw.clone(), labels.clone()))
            .collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let state = self.read()?;
        let mut stats = StoreStats {
            labeled_strings: state.labeled_strings(),
            ..StoreStats::default()
        };

        for attribute in state.categories.keys() {
            let (count, examples) = state
                .active_categories(*attribute)
                .fold((0, 0), |(n, total), (_, counts)| (n + 1, total + counts.examples));
            stats.categories.insert(*attribute, count);
            stats.examples.insert(*attribute, examples);
        }
        Ok(stats)
    }
}
