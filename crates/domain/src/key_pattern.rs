//! Redis-style glob patterns over cache keys.

use fleetgate_core::{AppError, AppResult};
use globset::{GlobBuilder, GlobMatcher};

/// Validated glob supporting `*`, `?`, `[set]`, `[^set]`, `[a-z]` and `\` escapes.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(GlobMatcher),
    /// Patterns the glob parser rejects, such as an unclosed class, match only themselves.
    Literal,
}

impl KeyPattern {
    /// Creates a pattern; empty patterns are rejected.
    pub fn new(pattern: impl Into<String>) -> AppResult<Self> {
        let raw = pattern.into();
        if raw.is_empty() {
            return Err(AppError::Validation(
                "key pattern must not be empty".to_owned(),
            ));
        }

        let matcher = GlobBuilder::new(translate(raw.as_str()).as_str())
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_or(Matcher::Literal, |glob| Matcher::Glob(glob.compile_matcher()));

        Ok(Self { raw, matcher })
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Returns whether the key matches the whole pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(glob) => glob.is_match(key),
            Matcher::Literal => self.raw == key,
        }
    }
}

impl PartialEq for KeyPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for KeyPattern {}

/// Rewrites Redis glob syntax into globset syntax.
///
/// `[^` negation becomes `[!` and alternation braces are escaped, since Redis
/// treats `{` and `}` as plain characters.
fn translate(pattern: &str) -> String {
    let mut translated = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(current) = chars.next() {
        match current {
            '\\' => {
                translated.push('\\');
                if let Some(escaped) = chars.next() {
                    translated.push(escaped);
                }
            }
            '[' if !in_class => {
                in_class = true;
                translated.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    translated.push('!');
                }
            }
            ']' if in_class => {
                in_class = false;
                translated.push(']');
            }
            '{' | '}' if !in_class => {
                translated.push('\\');
                translated.push(current);
            }
            other => translated.push(other),
        }
    }

    translated
}
