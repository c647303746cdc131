// File: src/engine.rs
use crate::classifier::Classifier;
use crate::config::{ClassifierConfig, SniffleConfig};
use crate::core::tokenizer::Tokenizer;
use crate::core::trie::PhraseTrie;
use crate::core::types::{Attribute, CategorySelector, Classification, Scores};
use crate::error::Result;
use crate::store::{CountStore, LabelSet};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The consumer-facing engine: one tokenizer, one shared store and a
/// classifier per attribute.
#[derive(Clone)]
pub struct Sniffer {
    tokenizer: Tokenizer,
    store: Arc<dyn CountStore>,
    classifiers: BTreeMap<Attribute, Classifier>,
}

impl Sniffer {
    pub fn new(tokenizer: Tokenizer, store: Arc<dyn CountStore>, config: ClassifierConfig) -> Self {
        let classifiers = Attribute::ALL
            .into_iter()
            .map(|attr| (attr, Classifier::with_config(attr, store.clone(), config)))
            .collect();

        Self { tokenizer, store, classifiers }
    }

    /// Builds an engine from configuration, loading the phrase dictionary.
    pub fn from_config(config: &SniffleConfig, store: Arc<dyn CountStore>) -> Result<Self> {
        let phrases = match &config.dictionary_path {
            Some(path) => PhraseTrie::load(path)?,
            None => PhraseTrie::builtin()?,
        };
        Ok(Self::new(Tokenizer::new(phrases), store, config.classifier))
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn store(&self) -> &Arc<dyn CountStore> {
        &self.store
    }

    pub fn classifier(&self, attribute: Attribute) -> &Classifier {
        // Every attribute gets a classifier in `new`.
        &self.classifiers[&attribute]
    }

    pub fn tokenize(&self, raw: &str) -> Vec<String> {
        self.tokenizer.tokenize(raw)
    }

    /// Confident answers for every attribute. Attributes without one are omitted.
    pub fn classify(&self, raw: &str) -> Result<BTreeMap<Attribute, Classification>> {
        let tokens = self.tokenize(raw);
        let mut results = BTreeMap::new();

        for (attribute, classifier) in &self.classifiers {
            if let Some(result) = classifier.classify(&tokens, Some(raw))? {
                results.insert(*attribute, result);
            }
        }
        Ok(results)
    }

    pub fn scores(&self, raw: &str, attribute: Attribute) -> Result<Scores> {
        self.classifier(attribute).scores(&self.tokenize(raw))
    }

    pub fn train(&self, raw: &str, attribute: Attribute, category: &str) -> Result<()> {
        let tokens = self.tokenize(raw);
        self.classifier(attribute).train(category, &tokens, raw)?;
        tracing::debug!(%attribute, category, raw, "learned user agent");
        Ok(())
    }

    pub fn untrain(&self, raw: &str, attribute: Attribute, selector: &CategorySelector) -> Result<bool> {
        let tokens = self.tokenize(raw);
        self.classifier(attribute).untrain(selector, &tokens, raw)
    }

    /// The label map, sorted by user agent.
    pub fn export(&self) -> Result<BTreeMap<String, LabelSet>> {
        Ok(self.store.labels()?)
    }
}
