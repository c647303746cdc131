// File: src/dataset.rs
//! Labeled dataset files.
//!
//! A dataset is a JSON object mapping each user agent string to an object of
//! attribute id → category:
//!
//! ```json
//! { "Mozilla/5.0 (...) Firefox/54.0": { "name": "Firefox", "engine": "Gecko" } }
//! ```

use crate::core::types::Attribute;
use crate::error::Result;
use crate::store::LabelSet;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One user agent with its known categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    pub user_agent: String,
    pub labels: LabelSet,
}

impl LabeledExample {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into(), labels: LabelSet::new() }
    }

    pub fn with_label(mut self, attribute: Attribute, category: impl Into<String>) -> Self {
        self.labels.insert(attribute, category.into());
        self
    }
}

pub fn load_labeled_set(path: &Path) -> Result<Vec<LabeledExample>> {
    tracing::info!(path = %path.display(), "parsing user agent data");
    let json = fs::read_to_string(path)?;
    parse_labeled_set(&json)
}

/// Parses a dataset. Keys that are not attribute ids, and non-string
/// categories, are skipped.
pub fn parse_labeled_set(json: &str) -> Result<Vec<LabeledExample>> {
    let raw: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(json)?;

    let examples = raw
        .into_iter()
        .map(|(user_agent, attrs)| {
            let mut example = LabeledExample::new(user_agent);
            for (id, value) in attrs {
                let Ok(attribute) = id.parse::<Attribute>() else {
                    continue;
                };
                match value {
                    Value::String(category) => {
                        example.labels.insert(attribute, category);
                    }
                    other => tracing::warn!(
                        user_agent = %example.user_agent,
                        %attribute,
                        value = %other,
                        "skipping non-string category"
                    ),
                }
            }
            example
        })
        .collect();

    Ok(examples)
}

/// Renders a label map in the dataset format, sorted by user agent and then
/// by attribute id.
pub fn to_json(labels: &BTreeMap<String, LabelSet>) -> Result<String> {
    let sorted: BTreeMap<&str, BTreeMap<&str, &str>> = labels
        .iter()
        .map(|(user_agent, attrs)| {
            let attrs = attrs
                .iter()
                .map(|(attribute, category)| (attribute.id(), category.as_str()))
                .collect();
            (user_agent.as_str(), attrs)
        })
        .collect();

    Ok(serde_json::to_string_pretty(&sorted)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_attributes_only() {
        let examples = parse_labeled_set(
            r#"{
                "Opera/9.80 (Windows NT 6.1) Presto/2.12.388": {
                    "name": "Opera", "engine": "Presto", "color": "red", "os": null
                },
                "curl/7.64.1": { "type": "Robot" }
            }"#,
        )
        .unwrap();

        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].user_agent, "Opera/9.80 (Windows NT 6.1) Presto/2.12.388");
        assert_eq!(examples[0].labels.len(), 2);
        assert_eq!(examples[0].labels[&Attribute::Engine], "Presto");
        assert_eq!(examples[1].labels[&Attribute::Type], "Robot");
    }

    #[test]
    fn export_sorts_attributes_by_id() {
        let mut labels = BTreeMap::new();
        let example = LabeledExample::new("ua")
            .with_label(Attribute::Type, "Browser")
            .with_label(Attribute::Name, "Chrome")
            .with_label(Attribute::Engine, "Blink");
        labels.insert(example.user_agent.clone(), example.labels);

        let json = to_json(&labels).unwrap();
        let engine = json.find("engine").unwrap();
        let name = json.find("name").unwrap();
        let kind = json.find("type").unwrap();
        assert!(engine < name && name < kind);

        let reparsed = parse_labeled_set(&json).unwrap();
        assert_eq!(reparsed[0].labels[&Attribute::Name], "Chrome");
    }

    #[test]
    fn malformed_dataset_is_an_error() {
        assert!(parse_labeled_set(r#"["not", "an", "object"]"#).is_err());
    }
}
