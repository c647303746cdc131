// File: src/core/tokenizer.rs
use crate::core::trie::PhraseTrie;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Runs of characters that are replaced by a single space.
static RE_DISCARD_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^ A-Za-z0-9_@+:./\\-]+").expect("valid regex"));

/// An MD5 or SHA hash of some kind, anywhere in the token.
static RE_HASH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[0-9a-f]{32,}").expect("valid regex"));

/// Probable language token, such as "en" or "en-US".
static RE_LANG_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(?:-[A-Za-z]{2})?$").expect("valid regex"));

/// Digits only, no decimals.
static RE_NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));

/// Versioned name such as "Firefox/54.0" or "rv:1.9.2b7pre".
static RE_VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+)(?:[/:]([0-9][A-Za-z0-9_.+-]*))+$").expect("valid regex")
});

/// The one versioned name that is kept whole.
const UNVERSIONED_NAME: &str = "Mozilla";

/// Turns raw user agent strings into deduplicated, normalized token lists.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    phrases: Arc<PhraseTrie>,
}

impl Tokenizer {
    pub fn new(phrases: PhraseTrie) -> Self {
        Self { phrases: Arc::new(phrases) }
    }

    /// Tokenizes a user agent string. Tokens are unique and in first-seen order.
    pub fn tokenize(&self, input: &str) -> Vec<String> {
        let cleaned = RE_DISCARD_CHARS.replace_all(input.trim(), " ");
        let tokens: Vec<&str> = cleaned.split(' ').filter(|t| !t.is_empty()).collect();

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        let mut record = |token: String| {
            if seen.insert(token.clone()) {
                unique.push(token);
            }
        };

        let mut index = 0;
        while index < tokens.len() {
            let token = tokens[index];

            if is_noise(token) {
                index += 1;
                continue;
            }

            if let Some(name) = versioned_name(token) {
                record(name.to_string());
                index += 1;
                continue;
            }

            let phrase_len = self.phrases.longest_phrase_at(tokens.as_slice(), index);
            if phrase_len > 1 {
                record(tokens[index..index + phrase_len].join(" "));
                index += phrase_len;
            } else {
                record(token.to_string());
                index += 1;
            }
        }

        tracing::trace!(input, tokens = ?unique, "tokenized");
        unique
    }
}

fn is_noise(token: &str) -> bool {
    token.is_empty()
        || RE_NUMBER_TOKEN.is_match(token)
        || RE_LANG_TOKEN.is_match(token)
        || RE_HASH_TOKEN.is_match(token)
}

fn versioned_name(token: &str) -> Option<&str> {
    let name = RE_VERSION_TOKEN.captures(token)?.get(1)?.as_str();
    (name != UNVERSIONED_NAME).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(phrases: &[&str]) -> Tokenizer {
        Tokenizer::new(PhraseTrie::from_phrases(phrases))
    }

    #[test]
    fn firefox_on_windows() {
        let tokens = tokenizer(&["Windows NT 10.0"])
            .tokenize("Mozilla/5.0 (Windows NT 10.0; rv:54.0) Gecko/20100101 Firefox/54.0");
        assert_eq!(tokens, vec!["Mozilla/5.0", "Windows NT 10.0", "rv", "Gecko", "Firefox"]);
        assert!(!tokens.iter().any(|t| t == "Mozilla"));
    }

    #[test]
    fn discards_noise_tokens() {
        let tokens = tokenizer(&[]).tokenize(
            "Bot 12345 en en-US de-de 0123456789abcdef0123456789ABCDEF ident=x0123456789abcdef0123456789abcdefx",
        );
        assert_eq!(tokens, vec!["Bot", "ident"]);
    }

    #[test]
    fn language_pattern_requires_lowercase_prefix() {
        let tokens = tokenizer(&[]).tokenize("EN X11 U");
        assert_eq!(tokens, vec!["EN", "X11", "U"]);
    }

    #[test]
    fn hash_is_discarded_before_phrase_matching() {
        let hash = "0123456789abcdef0123456789abcdef";
        let phrase = format!("{hash} Agent");
        let tokens = tokenizer(&[phrase.as_str()]).tokenize(&phrase);
        assert_eq!(tokens, vec!["Agent"]);
    }

    #[test]
    fn phrases_consume_following_tokens() {
        let tokens = tokenizer(&["Mac OS", "Mac OS X", "like Gecko"])
            .tokenize("(Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/603.3.8 (KHTML, like Gecko)");
        assert_eq!(
            tokens,
            vec!["Macintosh", "Intel", "Mac OS X", "10_12_6", "AppleWebKit", "KHTML", "like Gecko"]
        );
    }

    #[test]
    fn phrases_may_swallow_otherwise_discarded_tokens() {
        let tokens = tokenizer(&["PlayStation 4"]).tokenize("Mozilla/5.0 (PlayStation 4 5.55)");
        assert_eq!(tokens, vec!["Mozilla/5.0", "PlayStation 4", "5.55"]);
    }

    #[test]
    fn single_token_phrase_is_recorded_as_is() {
        let tokens = tokenizer(&["X11"]).tokenize("X11 Linux");
        assert_eq!(tokens, vec!["X11", "Linux"]);
    }

    #[test]
    fn duplicates_collapse_in_first_seen_order() {
        let tokens = tokenizer(&[]).tokenize("Safari/1 Chrome Safari/2 Chrome");
        assert_eq!(tokens, vec!["Safari", "Chrome"]);
    }

    #[test]
    fn all_discarded_input_is_empty() {
        assert!(tokenizer(&[]).tokenize("  (12; en-GB) ;; 99 ").is_empty());
        assert!(tokenizer(&[]).tokenize("").is_empty());
    }

    #[test]
    fn multiple_version_groups_keep_only_the_name() {
        let tokens = tokenizer(&[]).tokenize("curl/7.64.1:2 Dalvik/2.1.0");
        assert_eq!(tokens, vec!["curl", "Dalvik"]);
    }
}
