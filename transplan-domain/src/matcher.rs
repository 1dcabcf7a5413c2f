use crate::error::DomainError;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use transplan_types::file::FileId;

/// How `remove` patterns from a plan select sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMatch {
    /// Unanchored, case-sensitive regular expression searched in the path.
    #[default]
    Regex,
    /// The pattern is a path; only that file is removed.
    Exact,
}

impl RemovalMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            RemovalMatch::Regex => "regex",
            RemovalMatch::Exact => "exact",
        }
    }
}

/// Compiled set of removal patterns.
///
/// A source is removed if any pattern selects it, so the outcome does not
/// depend on pattern order.
#[derive(Debug, Clone)]
pub struct RemovalMatcher {
    inner: Inner,
    base: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
enum Inner {
    Regex(Vec<Regex>),
    Exact(BTreeSet<FileId>),
}

impl RemovalMatcher {
    pub fn new(
        patterns: &[String],
        mode: RemovalMatch,
        base: Option<&Utf8Path>,
    ) -> Result<Self, DomainError> {
        let inner = match mode {
            RemovalMatch::Regex => Inner::Regex(
                patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| DomainError::InvalidPattern {
                            pattern: p.clone(),
                            message: e.to_string(),
                        })
                    })
                    .collect::<Result<_, _>>()?,
            ),
            RemovalMatch::Exact => Inner::Exact(
                patterns
                    .iter()
                    .map(|p| FileId::from(p.as_str()).resolve(base))
                    .collect(),
            ),
        };
        Ok(Self {
            inner,
            base: base.map(Utf8Path::to_path_buf),
        })
    }

    pub fn is_empty(&self) -> bool {
        match &self.inner {
            Inner::Regex(patterns) => patterns.is_empty(),
            Inner::Exact(paths) => paths.is_empty(),
        }
    }

    /// Regex patterns are tried against the id as written and, when a base
    /// is known, against the resolved path as well.
    pub fn matches(&self, id: &FileId) -> bool {
        match &self.inner {
            Inner::Regex(patterns) => {
                let resolved = self.base.as_deref().map(|b| id.resolve(Some(b)));
                patterns.iter().any(|re| {
                    re.is_match(id.as_str())
                        || resolved.as_ref().is_some_and(|r| re.is_match(r.as_str()))
                })
            }
            Inner::Exact(paths) => paths.contains(&id.resolve(self.base.as_deref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn regex_is_unanchored_and_case_sensitive() {
        let m = RemovalMatcher::new(&patterns(&["b\\.f"]), RemovalMatch::Regex, None)
            .expect("matcher");
        assert!(m.matches(&FileId::from("src/b.f")));
        assert!(m.matches(&FileId::from("src/bb.f")));
        assert!(!m.matches(&FileId::from("src/B.f")));
        assert!(!m.matches(&FileId::from("src/a.f")));
    }

    #[test]
    fn regex_tries_resolved_path() {
        let m = RemovalMatcher::new(
            &patterns(&["^/proj/src/b\\.f$"]),
            RemovalMatch::Regex,
            Some(Utf8Path::new("/proj")),
        )
        .expect("matcher");
        assert!(m.matches(&FileId::from("src/b.f")));
    }

    #[test]
    fn exact_only_hits_the_named_file() {
        let m = RemovalMatcher::new(
            &patterns(&["/proj/src/b.f"]),
            RemovalMatch::Exact,
            Some(Utf8Path::new("/proj")),
        )
        .expect("matcher");
        assert!(m.matches(&FileId::from("src/b.f")));
        assert!(m.matches(&FileId::from("./src/b.f")));
        assert!(!m.matches(&FileId::from("src/bb.f")));
        assert!(!m.matches(&FileId::from("other/src/b.f")));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = RemovalMatcher::new(&patterns(&["("]), RemovalMatch::Regex, None)
            .expect_err("invalid");
        assert!(matches!(err, DomainError::InvalidPattern { ref pattern, .. } if pattern == "("));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let m = RemovalMatcher::new(&[], RemovalMatch::Regex, None).expect("matcher");
        assert!(m.is_empty());
        assert!(!m.matches(&FileId::from("a.f")));
    }
}
