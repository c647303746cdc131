// File: src/learning.rs
//! Batch import and accuracy testing over labeled datasets.
//!
//! Examples are independent, so a fixed pool of scoped worker threads pulls
//! them from a shared cursor. At most `concurrency` examples are in flight.
//! A store failure stops the pool and fails the batch; anything else only
//! skips the offending example.

use crate::config::DEFAULT_CONCURRENCY;
use crate::dataset::LabeledExample;
use crate::engine::Sniffer;
use crate::error::{Result, SniffError};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Called with `(completed, total)` after each example.
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Sync);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub examples: usize,
    pub labels: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccuracyReport {
    pub hits: usize,
    pub misses: usize,
}

impl AccuracyReport {
    /// Fraction of labels predicted correctly; 0 when nothing was tested.
    pub fn success_rate(&self) -> f64 {
        let tested = self.hits + self.misses;
        if tested == 0 {
            return 0.0;
        }
        self.hits as f64 / tested as f64
    }
}

pub struct LearningEngine {
    concurrency: usize,
    sample: Option<usize>,
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl LearningEngine {
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency: concurrency.max(1), sample: None }
    }

    /// Work on a random sample of this size instead of every example.
    pub fn with_sample(mut self, sample: Option<usize>) -> Self {
        self.sample = sample;
        self
    }

    /// Trains every labeled attribute of every example.
    pub fn import(
        &self,
        sniffer: &Sniffer,
        examples: Vec<LabeledExample>,
        progress: Option<Progress<'_>>,
    ) -> Result<ImportReport> {
        let examples = self.select(examples);
        tracing::info!(examples = examples.len(), concurrency = self.concurrency, "training the classifier");

        let labels = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        run_bounded(&examples, self.concurrency, progress, |example| {
            let tokens = sniffer.tokenize(&example.user_agent);
            for (attribute, category) in &example.labels {
                let trained = sniffer
                    .classifier(*attribute)
                    .train(category, &tokens, &example.user_agent);
                match trained {
                    Ok(()) => {
                        labels.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) if e.is_store_failure() => return Err(e),
                    Err(e) => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(user_agent = %example.user_agent, %attribute, error = %e, "skipping label");
                    }
                }
            }
            Ok(())
        })?;

        let report = ImportReport {
            examples: examples.len(),
            labels: labels.into_inner(),
            skipped: skipped.into_inner(),
        };
        tracing::info!(?report, "import finished");
        Ok(report)
    }

    /// Classifies every labeled attribute by token scoring alone and tallies
    /// how often the top category matches the label.
    pub fn evaluate(
        &self,
        sniffer: &Sniffer,
        examples: Vec<LabeledExample>,
        progress: Option<Progress<'_>>,
    ) -> Result<AccuracyReport> {
        let examples = self.select(examples);
        tracing::info!(examples = examples.len(), "testing the classifier");

        let hits = AtomicUsize::new(0);
        let misses = AtomicUsize::new(0);

        run_bounded(&examples, self.concurrency, progress, |example| {
            let tokens = sniffer.tokenize(&example.user_agent);
            for (attribute, expected) in &example.labels {
                let result = sniffer.classifier(*attribute).classify(&tokens, None)?;
                if result.is_some_and(|r| r.category == *expected) {
                    hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    misses.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(())
        })?;

        let report = AccuracyReport { hits: hits.into_inner(), misses: misses.into_inner() };
        tracing::info!(?report, rate = report.success_rate(), "test finished");
        Ok(report)
    }

    fn select(&self, mut examples: Vec<LabeledExample>) -> Vec<LabeledExample> {
        if let Some(size) = self.sample {
            examples.shuffle(&mut rand::rng());
            examples.truncate(size);
        }
        examples
    }
}

/// Trains a whole labeled set with the default concurrency.
pub fn import_labeled_set(sniffer: &Sniffer, examples: Vec<LabeledExample>) -> Result<ImportReport> {
    LearningEngine::default().import(sniffer, examples, None)
}

/// Success rate of the classifier on a labeled set.
pub fn evaluate_accuracy(sniffer: &Sniffer, examples: Vec<LabeledExample>) -> Result<f64> {
    Ok(LearningEngine::default().evaluate(sniffer, examples, None)?.success_rate())
}

/// Runs `work` over `items` on at most `concurrency` threads. The first error
/// stops workers from taking new items and is returned.
fn run_bounded<T, F>(
    items: &[T],
    concurrency: usize,
    progress: Option<Progress<'_>>,
    work: F,
) -> Result<()>
where
    T: Sync,
    F: Fn(&T) -> Result<()> + Sync,
{
    let total = items.len();
    let cursor = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let aborted = AtomicBool::new(false);
    let failure: Mutex<Option<SniffError>> = Mutex::new(None);

    let workers = concurrency.max(1).min(total);
    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| {
                while !aborted.load(Ordering::Acquire) {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index) else {
                        break;
                    };

                    if let Err(e) = work(item) {
                        aborted.store(true, Ordering::Release);
                        let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
                        if slot.is_none() {
                            tracing::error!(error = %e, index, "batch aborted");
                            *slot = Some(e);
                        }
                        break;
                    }

                    let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                    if let Some(report) = progress {
                        report(done, total);
                    }
                }
            });
        }
    });

    match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::core::tokenizer::Tokenizer;
    use crate::core::trie::PhraseTrie;
    use crate::core::types::Attribute;
    use crate::error::StoreError;
    use crate::store::{CountStore, LabelSet, MemoryStore, ScoringSnapshot, StoreStats};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    fn sniffer_with(store: Arc<dyn CountStore>) -> Sniffer {
        let phrases = PhraseTrie::builtin().unwrap();
        Sniffer::new(Tokenizer::new(phrases), store, ClassifierConfig::default())
    }

    fn dataset() -> Vec<LabeledExample> {
        let mut examples = Vec::new();
        for version in 50..70 {
            examples.push(
                LabeledExample::new(format!(
                    "Mozilla/5.0 (Windows NT 10.0; rv:{version}.0) Gecko/20100101 Firefox/{version}.0"
                ))
                .with_label(Attribute::Name, "Firefox")
                .with_label(Attribute::Engine, "Gecko"),
            );
            examples.push(
                LabeledExample::new(format!(
                    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version}.0.1 Safari/537.36"
                ))
                .with_label(Attribute::Name, "Chrome")
                .with_label(Attribute::Engine, "Blink"),
            );
        }
        examples
    }

    #[test]
    fn import_trains_every_label() {
        let store = Arc::new(MemoryStore::new());
        let sniffer = sniffer_with(store.clone());
        let calls = AtomicUsize::new(0);
        let progress = |_done: usize, total: usize| {
            assert_eq!(total, 40);
            calls.fetch_add(1, Ordering::Relaxed);
        };

        let report = LearningEngine::new(8).import(&sniffer, dataset(), Some(&progress)).unwrap();

        assert_eq!(report, ImportReport { examples: 40, labels: 80, skipped: 0 });
        assert_eq!(calls.load(Ordering::Relaxed), 40);
        assert_eq!(store.total_example_count().unwrap(), 40);
        assert_eq!(store.example_counts(Attribute::Name).unwrap()["Chrome"], 20);
    }

    #[test]
    fn reimport_does_not_double_count() {
        let store = Arc::new(MemoryStore::new());
        let sniffer = sniffer_with(store.clone());
        let engine = LearningEngine::new(4);
        engine.import(&sniffer, dataset(), None).unwrap();
        let before = store.snapshot().unwrap();

        engine.import(&sniffer, dataset(), None).unwrap();
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn evaluate_after_import_is_accurate() {
        let sniffer = sniffer_with(Arc::new(MemoryStore::new()));
        import_labeled_set(&sniffer, dataset()).unwrap();

        let rate = evaluate_accuracy(&sniffer, dataset()).unwrap();
        assert_eq!(rate, 1.0);
    }

    #[test]
    fn untrained_classifier_misses_everything() {
        let sniffer = sniffer_with(Arc::new(MemoryStore::new()));
        let report = LearningEngine::new(2).evaluate(&sniffer, dataset(), None).unwrap();
        assert_eq!(report, AccuracyReport { hits: 0, misses: 80 });
        assert_eq!(report.success_rate(), 0.0);
        assert_eq!(AccuracyReport::default().success_rate(), 0.0);
    }

    #[test]
    fn sampling_limits_the_batch() {
        let sniffer = sniffer_with(Arc::new(MemoryStore::new()));
        let report = LearningEngine::new(3)
            .with_sample(Some(5))
            .import(&sniffer, dataset(), None)
            .unwrap();
        assert_eq!(report.examples, 5);
        assert_eq!(report.labels, 10);
    }

    #[test]
    fn invalid_labels_are_skipped() {
        let sniffer = sniffer_with(Arc::new(MemoryStore::new()));
        let examples = vec![LabeledExample::new("curl/7.64.1")
            .with_label(Attribute::Type, "  ")
            .with_label(Attribute::Name, "curl")];
        let report = LearningEngine::new(1).import(&sniffer, examples, None).unwrap();
        assert_eq!(report, ImportReport { examples: 1, labels: 1, skipped: 1 });
    }

    /// Store whose transactions always fail.
    struct BrokenStore;

    impl CountStore for BrokenStore {
        fn example_counts(&self, _: Attribute) -> std::result::Result<BTreeMap<String, u64>, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn token_counts(
            &self,
            _: Attribute,
            _: &str,
            _: &[String],
        ) -> std::result::Result<HashMap<String, u64>, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn total_example_count(&self) -> std::result::Result<u64, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn label(&self, _: &str, _: Attribute) -> std::result::Result<Option<String>, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn apply_train(&self, _: Attribute, _: &str, _: &str, _: &[String]) -> std::result::Result<(), StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn apply_untrain(
            &self,
            _: Attribute,
            _: &str,
            _: &str,
            _: &[String],
        ) -> std::result::Result<bool, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn scoring_snapshot(
            &self,
            _: Attribute,
            _: &[String],
        ) -> std::result::Result<ScoringSnapshot, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn labels(&self) -> std::result::Result<BTreeMap<String, LabelSet>, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
        fn stats(&self) -> std::result::Result<StoreStats, StoreError> {
            Err(StoreError::Transaction("unreachable".into()))
        }
    }

    #[test]
    fn store_failure_aborts_the_batch() {
        let sniffer = sniffer_with(Arc::new(BrokenStore));
        let err = LearningEngine::new(8).import(&sniffer, dataset(), None).unwrap_err();
        assert!(err.is_store_failure());

        let err = LearningEngine::new(8).evaluate(&sniffer, dataset(), None).unwrap_err();
        assert!(err.is_store_failure());
    }
}
