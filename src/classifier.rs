// File: src/classifier.rs
//! Incremental Naive-Bayes classifier for a single attribute.

use crate::config::ClassifierConfig;
use crate::core::types::{Attribute, CategorySelector, Classification, Scores};
use crate::error::{Result, SniffError};
use crate::store::{CategorySnapshot, CountStore};
use std::sync::Arc;

/// Score reported for strings whose label is already known.
pub const KNOWN_SCORE: f64 = 1000.0;

/// Classifies user agents into the exclusive categories of one attribute,
/// e.g. "Firefox", "Safari" or "Chrome" for `name`.
///
/// Holds no counts of its own; everything lives in the shared store, so
/// instances are cheap to clone and recreate.
#[derive(Clone)]
pub struct Classifier {
    attribute: Attribute,
    store: Arc<dyn CountStore>,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(attribute: Attribute, store: Arc<dyn CountStore>) -> Self {
        Self::with_config(attribute, store, ClassifierConfig::default())
    }

    pub fn with_config(
        attribute: Attribute,
        store: Arc<dyn CountStore>,
        config: ClassifierConfig,
    ) -> Self {
        Self { attribute, store, config }
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    /// The most likely category, or `None` when the top score is below the
    /// confidence threshold. A known `raw` string short-circuits scoring.
    pub fn classify(&self, tokens: &[String], raw: Option<&str>) -> Result<Option<Classification>> {
        if let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            if let Some(category) = self.store.label(raw, self.attribute)? {
                return Ok(Some(Classification { category, score: KNOWN_SCORE }));
            }
        }

        let scores = self.scores(tokens)?;
        let Some((category, score)) = scores.into_iter().next() else {
            return Ok(None);
        };

        if score < self.config.threshold {
            tracing::debug!(attribute = %self.attribute, category, score, "below threshold");
            return Ok(None);
        }
        Ok(Some(Classification { category, score }))
    }

    /// Log-likelihood of every category with examples, highest first.
    ///
    /// ```text
    /// score(C) = ln(examples(C) / total)
    ///          + Σ ln(count(C, t) + smoothing / (examples(C) + |tokens|))
    /// ```
    ///
    /// `total` counts labeled strings across every attribute, not only this one.
    pub fn scores(&self, tokens: &[String]) -> Result<Scores> {
        let snapshot = self.store.scoring_snapshot(self.attribute, tokens)?;
        if snapshot.total_examples == 0 || snapshot.categories.is_empty() {
            return Ok(Vec::new());
        }

        let total = snapshot.total_examples as f64;
        let token_count = tokens.len() as f64;

        let mut scores = Vec::with_capacity(snapshot.categories.len());
        for CategorySnapshot { category, examples, token_counts } in snapshot.categories {
            let examples = examples as f64;
            let unseen = self.config.smoothing / (examples + token_count);

            let mut score = (examples / total).ln();
            for token in tokens {
                let count = token_counts.get(token).copied().unwrap_or(0) as f64;
                score += (count + unseen).ln();
            }
            scores.push((category, score));
        }

        // Stable: ties keep category order.
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scores)
    }

    /// Teaches the classifier that `raw` (with `tokens`) belongs to `category`,
    /// replacing any category it was previously trained under.
    pub fn train(&self, category: &str, tokens: &[String], raw: &str) -> Result<()> {
        let category = required(category, "category")?;
        let raw = required(raw, "user agent")?;

        self.untrain(&CategorySelector::Any, tokens, raw)?;
        self.store.apply_train(self.attribute, category, raw, tokens)?;
        Ok(())
    }

    /// Undoes a previous `train`. Returns whether a label was removed.
    pub fn untrain(&self, selector: &CategorySelector, tokens: &[String], raw: &str) -> Result<bool> {
        let raw = required(raw, "user agent")?;

        let category = match selector {
            CategorySelector::Any => match self.store.resolve_wildcard_label(raw, self.attribute)? {
                Some(category) => category,
                None => return Ok(false),
            },
            CategorySelector::Exact(category) => required(category, "category")?.to_string(),
        };

        Ok(self.store.apply_untrain(self.attribute, &category, raw, tokens)?)
    }
}

fn required<'a>(value: &'a str, what: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SniffError::MissingInput(what));
    }
    Ok(trimmed)
}
