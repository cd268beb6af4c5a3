//! Cache key construction and glob-style key patterns.

use std::fmt;

use regex::Regex;

use super::CacheResult;

/// Default prefix prepended to every cache key.
pub const DEFAULT_KEY_PREFIX: &str = "fruitfulplanet:";

/// Separator between key segments.
const SEPARATOR: &str = ":";

/// Builds colon-joined cache keys that always start with a prefix.
///
/// ```rust
/// use fruitful_server::service::cache::CacheKeyBuilder;
///
/// let key = CacheKeyBuilder::new("p").add("x").add(1).build();
/// assert_eq!(key, "p:x:1");
///
/// let key = CacheKeyBuilder::default().add("brands").build();
/// assert_eq!(key, "fruitfulplanet:brands");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "key builders do nothing unless built"]
pub struct CacheKeyBuilder {
    parts: Vec<String>,
}

impl CacheKeyBuilder {
    /// Creates a builder seeded with `prefix`.
    ///
    /// A trailing separator on the prefix is dropped so it is not doubled.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref();
        let prefix = prefix.strip_suffix(SEPARATOR).unwrap_or(prefix);

        let parts = if prefix.is_empty() {
            Vec::new()
        } else {
            vec![prefix.to_owned()]
        };

        Self { parts }
    }

    /// Appends a segment.
    pub fn add(mut self, part: impl fmt::Display) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Joins all segments with `:`.
    #[must_use]
    pub fn build(&self) -> String {
        self.parts.join(SEPARATOR)
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl fmt::Display for CacheKeyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Glob-style pattern over whole cache keys.
///
/// Each `*` matches any run of characters, separators included, so
/// `prefix:http:*` also matches `prefix:http:extra:more`. Every other
/// character matches itself.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// Compiles a glob pattern.
    pub fn new(pattern: &str) -> CacheResult<Self> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("^{body}$"))?;
        Ok(Self { regex })
    }

    /// Returns `true` if the whole key matches.
    #[inline]
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_joins_parts() {
        assert_eq!(CacheKeyBuilder::new("p").add("x").add(1).build(), "p:x:1");
    }

    #[test]
    fn builder_falls_back_to_default_prefix() {
        let key = CacheKeyBuilder::default().add("http").add("GET").build();
        assert_eq!(key, "fruitfulplanet:http:GET");
    }

    #[test]
    fn builder_does_not_double_separator() {
        assert_eq!(CacheKeyBuilder::new("app:").add("a").build(), "app:a");
        assert_eq!(CacheKeyBuilder::new("").add("a").build(), "a");
    }

    #[test]
    fn builder_is_deterministic() {
        let first = CacheKeyBuilder::new("p").add("sector").add(42);
        let second = CacheKeyBuilder::new("p").add("sector").add(42);
        assert_eq!(first.build(), second.build());
        assert_eq!(first.to_string(), "p:sector:42");
    }

    #[test]
    fn pattern_matches_across_segments() -> anyhow::Result<()> {
        let pattern = KeyPattern::new("prefix:http:*")?;
        assert!(pattern.matches("prefix:http:GET"));
        assert!(pattern.matches("prefix:http:extra:more"));
        assert!(!pattern.matches("other:prefix:http:GET"));
        Ok(())
    }

    #[test]
    fn pattern_treats_other_characters_literally() -> anyhow::Result<()> {
        let pattern = KeyPattern::new("a.b:*")?;
        assert!(pattern.matches("a.b:1"));
        assert!(!pattern.matches("axb:1"));

        let exact = KeyPattern::new("a:1")?;
        assert!(exact.matches("a:1"));
        assert!(!exact.matches("a:10"));
        Ok(())
    }

    #[test]
    fn pattern_with_inner_wildcard() -> anyhow::Result<()> {
        let pattern = KeyPattern::new("p:http:*:/api/features*")?;
        assert!(pattern.matches("p:http:GET:/api/features:{}"));
        assert!(pattern.matches("p:http:GET:/api/features/metrics:{}"));
        assert!(!pattern.matches("p:http:GET:/api/brands:{}"));
        Ok(())
    }
}
