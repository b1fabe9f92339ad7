//! Shared primitive types used across the entire pipeline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The canonical run identifier.
pub type RunId = String;

/// Generate a fresh run identifier.
pub fn new_run_id() -> RunId {
    format!("run-{}", uuid::Uuid::new_v4())
}

/// A stable subscriber key as it appears in the input sources.
///
/// Ordering is numeric when both keys are plain integers and lexicographic
/// otherwise, so "9" sorts before "10".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<i128> {
        self.0.parse().ok()
    }
}

impl Ord for SubscriberId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for SubscriberId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Resolved subscription status for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Canceled,
}

impl Status {
    /// Parse free-text status. Whitespace and ASCII case are ignored.
    /// Returns None for anything other than active/canceled.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("active") {
            Some(Status::Active)
        } else if trimmed.eq_ignore_ascii_case("canceled") {
            Some(Status::Canceled)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active   => "active",
            Status::Canceled => "canceled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_sort_numerically() {
        let mut ids: Vec<SubscriberId> = ["10", "9", "b", "100", "a"].into_iter().map(SubscriberId::from).collect();
        ids.sort();
        let sorted: Vec<_> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(sorted, vec!["9", "10", "100", "a", "b"]);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }
}
