// File: src/core/types.rs
use crate::error::SniffError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A classifiable facet of a user agent string.
/// Each attribute is an independent namespace of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Name,
    Engine,
    Os,
    Type,
    Device,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::Name,
        Attribute::Engine,
        Attribute::Os,
        Attribute::Type,
        Attribute::Device,
    ];

    /// Stable identifier used on the command line, in datasets and in the store.
    pub fn id(&self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::Engine => "engine",
            Attribute::Os => "os",
            Attribute::Type => "type",
            Attribute::Device => "device",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Name => "Name",
            Attribute::Engine => "Engine",
            Attribute::Os => "OS",
            Attribute::Type => "Type",
            Attribute::Device => "Device",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Attribute::Name => {
                "Common browser or robot name, such as \"Firefox\", \"Safari\", \"Chrome\", or \"GoogleBot\"."
            }
            Attribute::Engine => "Browser or robot engine, such as \"Gecko\", \"WebKit\", or \"Blink\".",
            Attribute::Os => "Operating system name, such as \"Mac OS X\", \"iOS\", or \"Windows\".",
            Attribute::Type => "User agent type, such as \"Browser\", \"Robot\", \"Mobile\", etc.",
            Attribute::Device => "User agent device name, such as \"iPhone\", \"iPad\", \"HTC One\", etc.",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Attribute {
    type Err = SniffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        Attribute::ALL
            .into_iter()
            .find(|attr| attr.id() == id)
            .ok_or_else(|| SniffError::UnknownAttribute(s.trim().to_string()))
    }
}

/// Which label to remove when untraining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelector {
    /// Whatever category is currently recorded for the string.
    Any,
    Exact(String),
}

impl CategorySelector {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed == "*" || trimmed.eq_ignore_ascii_case("any") {
            CategorySelector::Any
        } else {
            CategorySelector::Exact(trimmed.to_string())
        }
    }
}

impl fmt::Display for CategorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategorySelector::Any => f.write_str("*"),
            CategorySelector::Exact(category) => f.write_str(category),
        }
    }
}

/// A confident answer for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub score: f64,
}

/// `(category, score)` pairs, highest score first.
pub type Scores = Vec<(String, f64)>;
