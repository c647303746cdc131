// File: src/lib.rs

pub mod classifier;
pub mod config;
pub mod core;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod learning;
pub mod logging;
pub mod persistence;
pub mod store;

pub use crate::classifier::Classifier;
pub use crate::core::tokenizer::Tokenizer;
pub use crate::core::trie::PhraseTrie;
pub use crate::core::types::{Attribute, CategorySelector, Classification};
pub use crate::engine::Sniffer;
pub use crate::error::{Result, SniffError, StoreError};
pub use crate::store::{CountStore, MemoryStore};
