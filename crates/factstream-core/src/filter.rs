//! Managed-object name filters.
//!
//! A filter is a semicolon-separated list of glob patterns (`*` matches any
//! run of characters, `?` a single character) applied to an identifier's
//! canonical and as-written renderings. The default include filter matches
//! everything, the default exclude filter matches nothing.

use crate::model::ObjectId;

/// Pattern matching everything.
pub const MATCH_ALL: &str = "*:*";

/// Error raised for unusable filter strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A semicolon-delimited token was empty.
    EmptyPattern(String),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::EmptyPattern(s) => write!(f, "empty pattern in filter '{}'", s),
        }
    }
}

impl std::error::Error for FilterError {}

/// One glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
}

impl Pattern {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches against the canonical rendering first, then the as-written
    /// one, so property order in the pattern does not matter for exact
    /// names.
    pub fn matches(&self, id: &ObjectId) -> bool {
        glob_match(&self.raw, &id.canonical()) || glob_match(&self.raw, &id.to_string())
    }
}

/// Iterative glob matcher with single-star backtracking.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// A semicolon-separated list of patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    /// Parses a semicolon-separated filter string. An empty string yields an
    /// empty list, which matches nothing.
    pub fn parse(filter: &str) -> Result<Self, FilterError> {
        let mut patterns = Vec::new();
        if filter.trim().is_empty() {
            return Ok(Self { patterns });
        }
        for token in filter.split(';') {
            let token = token.trim();
            if token.is_empty() {
                return Err(FilterError::EmptyPattern(filter.to_string()));
            }
            patterns.push(Pattern::new(token));
        }
        Ok(Self { patterns })
    }

    /// The default include filter: matches every identifier.
    pub fn match_all() -> Self {
        Self {
            patterns: vec![Pattern::new(MATCH_ALL)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// True if any pattern matches. An empty list matches nothing.
    pub fn matches(&self, id: &ObjectId) -> bool {
        self.patterns.iter().any(|p| p.matches(id))
    }
}

impl std::fmt::Display for PatternList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self.patterns.iter().map(|p| p.as_str()).collect();
        write!(f, "{}", parts.join(";"))
    }
}
