// File: src/core/mod.rs
pub mod tokenizer;
pub mod trie;
pub mod types;
