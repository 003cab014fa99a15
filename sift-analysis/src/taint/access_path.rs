//! Access paths with k-limiting.
//!
//! An access path names a specific slice of a value (`req.body.user`).
//! Equality is structural; aliasing is conservative: two paths alias when
//! either's field tuple is a prefix of the other's, so taint on `req.body`
//! reaches a sink reading `req.body.user`, while `req.headers` does not.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Field tuples are k-limited (default 5), so they fit inline.
pub type FieldChain = SmallVec<[String; 5]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPath {
    pub base: String,
    pub fields: FieldChain,
}

impl AccessPath {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            fields: FieldChain::new(),
        }
    }

    /// Parse a dotted chain (`req.body.user`), truncating at `k` fields.
    pub fn parse(chain: &str, k: usize) -> Option<Self> {
        let mut parts = chain.split('.');
        let base = parts.next()?.trim();
        if base.is_empty() {
            return None;
        }
        let fields: FieldChain = parts
            .take(k)
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        Some(Self {
            base: base.to_string(),
            fields,
        })
    }

    /// Append a field, truncating at `k` (conservative on overflow).
    pub fn extend(&self, field: &str, k: usize) -> Self {
        let mut fields = self.fields.clone();
        if fields.len() < k {
            fields.push(field.to_string());
        }
        Self {
            base: self.base.clone(),
            fields,
        }
    }

    /// Conservative alias rule: equal bases and one field tuple is a
    /// prefix of the other (either way).
    pub fn matches(&self, other: &AccessPath) -> bool {
        if self.base != other.base {
            return false;
        }
        let n = self.fields.len().min(other.fields.len());
        self.fields[..n] == other.fields[..n]
    }

    /// One-directional refinement: `pattern` is a prefix of `self`.
    /// `req.body.user` has prefix `req.body`; bare `req` does not have
    /// prefix `req.body`.
    pub fn has_prefix(&self, pattern: &AccessPath) -> bool {
        self.base == pattern.base
            && self.fields.len() >= pattern.fields.len()
            && self.fields[..pattern.fields.len()] == pattern.fields[..]
    }

    pub fn render(&self) -> String {
        if self.fields.is_empty() {
            self.base.clone()
        } else {
            format!("{}.{}", self.base, self.fields.join("."))
        }
    }
}

impl std::fmt::Display for AccessPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_truncates_at_k() {
        let ap = AccessPath::parse("a.b.c.d.e.f.g", 5).unwrap();
        assert_eq!(ap.base, "a");
        assert_eq!(ap.fields.as_slice(), ["b", "c", "d", "e", "f"]);
    }

    #[test]
    fn truncated_path_matches_longer_prefix() {
        let truncated = AccessPath::parse("a.b.c.d.e.f", 5).unwrap();
        let longer = AccessPath::parse("a.b.c.d.e.f.g", 10).unwrap();
        assert!(truncated.matches(&longer));
        assert!(longer.matches(&truncated));
    }

    #[test]
    fn prefix_aliasing_is_symmetric_and_base_sensitive() {
        let body = AccessPath::parse("req.body", 5).unwrap();
        let user = AccessPath::parse("req.body.user", 5).unwrap();
        let headers = AccessPath::parse("req.headers", 5).unwrap();
        assert!(body.matches(&user));
        assert!(user.matches(&body));
        assert!(!headers.matches(&body));
        assert!(!AccessPath::new("res").matches(&AccessPath::new("req")));
    }

    #[test]
    fn prefix_refinement_is_one_directional() {
        let pattern = AccessPath::parse("req.body", 5).unwrap();
        let specific = AccessPath::parse("req.body.user", 5).unwrap();
        let bare = AccessPath::parse("req", 5).unwrap();
        assert!(specific.has_prefix(&pattern));
        assert!(!bare.has_prefix(&pattern));
        assert!(bare.has_prefix(&AccessPath::new("req")));
    }

    #[test]
    fn extend_respects_k() {
        let ap = AccessPath::parse("a.b.c.d.e", 5).unwrap();
        let extended = ap.extend("f", 5);
        assert_eq!(extended.fields.len(), 5);
        let full = AccessPath::parse("a.b", 5).unwrap().extend("c", 5);
        assert_eq!(full.render(), "a.b.c");
    }
}
