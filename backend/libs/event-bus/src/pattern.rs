//! Topic-exchange binding patterns
//!
//! Routing keys are dot-separated words. In a binding, `*` matches exactly
//! one word and `#` matches zero or more words.

use crate::error::{EventBusError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    words: Vec<String>,
}

impl TopicPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(EventBusError::InvalidBinding("empty binding".to_string()));
        }
        let words: Vec<String> = raw.split('.').map(str::to_string).collect();
        if words.iter().any(String::is_empty) {
            return Err(EventBusError::InvalidBinding(format!(
                "empty word in binding '{}'",
                raw
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            words,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the binding names exactly one routing key
    pub fn is_exact(&self) -> bool {
        self.words.iter().all(|w| w != "*" && w != "#")
    }

    pub fn matches(&self, routing_key: &str) -> bool {
        let key: Vec<&str> = routing_key.split('.').collect();
        let pattern: Vec<&str> = self.words.iter().map(String::as_str).collect();
        match_words(&pattern, &key)
    }

    /// Regular expression matching the full topic names this binding selects
    /// when routing key `k` is published as topic `<prefix>.<k>`.
    pub fn to_topic_regex(&self, prefix: &str) -> String {
        let mut body = String::new();
        let only_hash = self.words.len() == 1 && self.words[0] == "#";
        let mut after_leading_hash = false;

        for (i, word) in self.words.iter().enumerate() {
            match word.as_str() {
                "#" if only_hash => body.push_str(".+"),
                "#" if i == 0 => {
                    body.push_str(r"(?:[^.]+\.)*");
                    after_leading_hash = true;
                    continue;
                }
                "#" => body.push_str(r"(?:\.[^.]+)*"),
                other => {
                    if i > 0 && !after_leading_hash {
                        body.push_str(r"\.");
                    }
                    if other == "*" {
                        body.push_str("[^.]+");
                    } else {
                        body.push_str(&regex::escape(other));
                    }
                }
            }
            after_leading_hash = false;
        }

        format!("^{}\\.{}$", regex::escape(prefix), body)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((first, key_rest)) => (word == "*" || word == *first) && match_words(rest, key_rest),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    const CASES: &[(&str, &str, bool)] = &[
        ("post.created", "post.created", true),
        ("post.created", "post.deleted", false),
        ("post.*", "post.liked", true),
        ("post.*", "post", false),
        ("post.*", "post.liked.extra", false),
        ("user.*", "post.created", false),
        ("#", "post.created", true),
        ("post.#", "post", true),
        ("post.#", "post.a.b", true),
        ("#.deleted", "post.deleted", true),
        ("#.deleted", "deleted", true),
        ("#.deleted", "post.created", false),
        ("*.deleted", "user.deleted", true),
        ("post.#.done", "post.done", true),
        ("post.#.done", "post.x.y.done", true),
        ("dlq.#", "dlq.post.deleted", true),
    ];

    #[test]
    fn test_word_matching() {
        for (pattern, key, expected) in CASES {
            let pattern = TopicPattern::parse(pattern).unwrap();
            assert_eq!(pattern.matches(key), *expected, "{} vs {}", pattern, key);
        }
    }

    #[test]
    fn test_topic_regex_agrees_with_word_matching() {
        for (pattern, key, expected) in CASES {
            let pattern = TopicPattern::parse(pattern).unwrap();
            let re = Regex::new(&pattern.to_topic_regex("nova.events")).unwrap();
            let topic = format!("nova.events.{}", key);
            assert_eq!(re.is_match(&topic), *expected, "{} vs {}", pattern, topic);
        }
    }

    #[test]
    fn test_regex_is_anchored_to_prefix() {
        let pattern = TopicPattern::parse("post.*").unwrap();
        let re = Regex::new(&pattern.to_topic_regex("nova.events")).unwrap();
        assert!(!re.is_match("other.events.post.created"));
        assert!(!re.is_match("novaXevents.post.created"));
    }

    #[test]
    fn test_invalid_bindings_rejected() {
        assert!(TopicPattern::parse("").is_err());
        assert!(TopicPattern::parse("post..created").is_err());
        assert!(TopicPattern::parse("post.created").unwrap().is_exact());
        assert!(!TopicPattern::parse("post.*").unwrap().is_exact());
    }
}
