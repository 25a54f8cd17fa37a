//! Invalidation targets: exact keys or glob patterns

use std::fmt;

/// What to evict
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    /// A single key, deleted as-is
    Key(String),
    /// A Redis-style glob (`*` any run, `?` one char), resolved by scanning
    Pattern(String),
}

impl InvalidationTarget {
    /// Classify a raw string; anything containing `*` or `?` is a pattern.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.contains(['*', '?']) {
            InvalidationTarget::Pattern(raw)
        } else {
            InvalidationTarget::Key(raw)
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        InvalidationTarget::Key(key.into())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        InvalidationTarget::Pattern(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            InvalidationTarget::Key(k) => k,
            InvalidationTarget::Pattern(p) => p,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, InvalidationTarget::Pattern(_))
    }
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for InvalidationTarget {
    fn from(raw: &str) -> Self {
        InvalidationTarget::parse(raw)
    }
}

impl From<String> for InvalidationTarget {
    fn from(raw: String) -> Self {
        InvalidationTarget::parse(raw)
    }
}

/// Glob match with Redis `MATCH` semantics for `*` and `?`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();

    let (mut pi, mut ki) = (0, 0);
    // Position of the last `*` and the key index it was tried at
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((star_pi, star_ki)) = star {
            pi = star_pi + 1;
            ki = star_ki + 1;
            star = Some((star_pi, star_ki + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classifies_targets() {
        assert_eq!(
            InvalidationTarget::parse("post:123"),
            InvalidationTarget::Key("post:123".to_string())
        );
        assert!(InvalidationTarget::parse("posts:*").is_pattern());
        assert!(InvalidationTarget::parse("user_profile:?").is_pattern());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("posts:*", "posts:cursor:start:20"));
        assert!(glob_match("posts:*", "posts:"));
        assert!(!glob_match("posts:*", "post:123"));
        assert!(!glob_match("posts:*", "posts-search:abc"));
        assert!(glob_match("posts-search:*", "posts-search:hello:20"));
        assert!(glob_match("post:?", "post:1"));
        assert!(!glob_match("post:?", "post:12"));
        assert!(glob_match("*:20", "posts:cursor:start:20"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }
}
