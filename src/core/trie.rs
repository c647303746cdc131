// File: src/core/trie.rs
use crate::error::{Result, SniffError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Built-in dictionary of common multi-token user agent phrases.
const BUILTIN_PHRASES: &str = include_str!("../../data/phrases.json");

/// Key that marks an object node's own path as a complete phrase.
const TERMINAL_KEY: &str = "";

#[derive(Debug, Clone, Default)]
struct PhraseNode {
    children: HashMap<String, usize>,
    terminal: bool,
}

/// An immutable prefix tree of known multi-token phrases, keyed by whole tokens.
/// Built once at startup and shared read-only by every tokenizer.
#[derive(Debug, Clone)]
pub struct PhraseTrie {
    nodes: Vec<PhraseNode>,
    phrases: usize,
}

impl Default for PhraseTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PhraseTrie {
    pub fn new() -> Self {
        Self { nodes: vec![PhraseNode::default()], phrases: 0 }
    }

    /// The dictionary compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_PHRASES)
    }

    /// Loads a compiled dictionary file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let trie = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), phrases = trie.len(), "loaded phrase dictionary");
        Ok(trie)
    }

    /// Parses the nested-object dictionary format.
    ///
    /// Each key is a token. A value of `true` ends a phrase at that token; an
    /// object continues the phrase, and may carry `"": true` when its own path
    /// is also a phrase (e.g. both "Mac OS" and "Mac OS X").
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(map) = root else {
            return Err(SniffError::Dictionary("top level must be an object".to_string()));
        };

        let mut trie = Self::new();
        trie.attach(0, &map)?;
        Ok(trie)
    }

    /// Builds a trie from whitespace-separated phrases.
    pub fn from_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::new();
        for phrase in phrases {
            let tokens: Vec<&str> = phrase.as_ref().split_whitespace().collect();
            trie.insert(&tokens);
        }
        trie
    }

    /// Registers one phrase. O(k) where k is the number of tokens.
    pub fn insert(&mut self, phrase: &[&str]) {
        if phrase.is_empty() {
            return;
        }

        let mut node_idx = 0;
        for token in phrase {
            node_idx = self.child_or_insert(node_idx, token);
        }
        self.mark_terminal(node_idx);
    }

    /// Length of the longest registered phrase starting at `start`, or 0.
    ///
    /// Descends one token at a time until no child matches. The depth reached
    /// counts only if the deepest node is itself a phrase end.
    pub fn longest_phrase_at<S: AsRef<str>>(&self, tokens: &[S], start: usize) -> usize {
        let mut node_idx = 0;
        let mut index = start;

        while let Some(&next_idx) = tokens
            .get(index)
            .and_then(|token| self.nodes[node_idx].children.get(token.as_ref()))
        {
            node_idx = next_idx;
            index += 1;
        }

        if self.nodes[node_idx].terminal {
            index - start
        } else {
            0
        }
    }

    /// Number of registered phrases.
    pub fn len(&self) -> usize {
        self.phrases
    }

    pub fn is_empty(&self) -> bool {
        self.phrases == 0
    }

    fn attach(&mut self, node_idx: usize, map: &Map<String, Value>) -> Result<()> {
        for (key, value) in map {
            if key == TERMINAL_KEY {
                match value {
                    Value::Bool(true) if node_idx != 0 => self.mark_terminal(node_idx),
                    _ => {
                        return Err(SniffError::Dictionary(format!(
                            "terminal marker must be `true` inside a phrase, found {value}"
                        )))
                    }
                }
                continue;
            }

            let child_idx = self.child_or_insert(node_idx, key);
            match value {
                Value::Bool(true) => self.mark_terminal(child_idx),
                Value::Object(children) => self.attach(child_idx, children)?,
                other => {
                    return Err(SniffError::Dictionary(format!(
                        "unexpected value for token {key:?}: {other}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn child_or_insert(&mut self, node_idx: usize, token: &str) -> usize {
        if let Some(&id) = self.nodes[node_idx].children.get(token) {
            return id;
        }
        let new_node_id = self.nodes.len();
        self.nodes.push(PhraseNode::default());
        self.nodes[node_idx].children.insert(token.to_string(), new_node_id);
        new_node_id
    }

    fn mark_terminal(&mut self, node_idx: usize) {
        if !self.nodes[node_idx].terminal {
            self.nodes[node_idx].terminal = true;
            self.phrases += 1;
        }
    }
}
