//! Route matchers tested against a request's `uri`.
//!
//! # Design
//! - Matching works on `/`-separated segments; empty segments (leading,
//!   trailing or doubled slashes) are ignored, so `/widgets/` and
//!   `/widgets` are the same path.
//! - Literal segments compare case-sensitively.
//! - No regex: a pattern is a list of literal and `:name` segments, and a
//!   match is a single linear walk.
//! - Captured segments are percent-decoded before they reach a controller.

use std::fmt;

use percent_encoding::percent_decode_str;

/// Values captured from `:name` segments, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decides whether a route accepts a URI.
pub trait RouteMatcher: Send + Sync + fmt::Debug {
    /// `Some` with any captured parameters when `uri` is accepted.
    fn matches(&self, uri: &str) -> Option<PathParams>;
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Pattern such as `/widgets/:id`. Every segment must line up; a `:name`
/// segment accepts any single non-empty segment.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let segments = segments(&pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { pattern, segments }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl RouteMatcher for PathPattern {
    fn matches(&self, uri: &str) -> Option<PathParams> {
        let parts: Vec<&str> = segments(uri).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.0.push((name.clone(), value));
                }
            }
        }
        Some(params)
    }
}

/// Accepts any URI whose leading segments equal the prefix's segments;
/// `/api` matches `/api` and `/api/v1` but not `/apiary`.
#[derive(Debug, Clone)]
pub struct PathPrefix {
    prefix: Vec<String>,
}

impl PathPrefix {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: segments(prefix.as_ref()).map(str::to_string).collect(),
        }
    }
}

impl RouteMatcher for PathPrefix {
    fn matches(&self, uri: &str) -> Option<PathParams> {
        let mut parts = segments(uri);
        self.prefix
            .iter()
            .all(|expected| parts.next() == Some(expected.as_str()))
            .then(PathParams::default)
    }
}

/// Accepts exactly one path.
#[derive(Debug, Clone)]
pub struct ExactPath {
    path: Vec<String>,
}

impl ExactPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: segments(path.as_ref()).map(str::to_string).collect(),
        }
    }
}

impl RouteMatcher for ExactPath {
    fn matches(&self, uri: &str) -> Option<PathParams> {
        segments(uri)
            .eq(self.path.iter().map(String::as_str))
            .then(PathParams::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_captures_params() {
        let pattern = PathPattern::new("/widgets/:id/parts/:part");
        let params = pattern.matches("/widgets/42/parts/a%20b").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("part"), Some("a b"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn pattern_requires_same_segment_count() {
        let pattern = PathPattern::new("/widgets/:id");
        assert!(pattern.matches("/widgets").is_none());
        assert!(pattern.matches("/widgets/1/extra").is_none());
        assert!(pattern.matches("/gadgets/1").is_none());
        assert!(pattern.matches("/widgets/1/").is_some());
    }

    #[test]
    fn pattern_literals_are_case_sensitive() {
        let pattern = PathPattern::new("/widgets");
        assert!(pattern.matches("/widgets").is_some());
        assert!(pattern.matches("/Widgets").is_none());
    }

    #[test]
    fn prefix_is_segment_aware() {
        let prefix = PathPrefix::new("/api");
        assert!(prefix.matches("/api").is_some());
        assert!(prefix.matches("/api/v1/things").is_some());
        assert!(prefix.matches("/apiary").is_none());
        assert!(PathPrefix::new("/").matches("/anything").is_some());
    }

    #[test]
    fn exact_path() {
        let exact = ExactPath::new("/health");
        assert!(exact.matches("/health").is_some());
        assert!(exact.matches("/health/").is_some());
        assert!(exact.matches("/health/deep").is_none());
    }
}
