use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One input/output demonstration of the transformation being learned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

impl Example {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Flanking change regions between an example's input and output, derived
/// from the common-substring anchors. Either side may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPair {
    pub left: String,
    pub right: String,
}

impl DiffPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Token of interest: the minimal semantically meaningful substring pair
/// that changes between an example's input and output. `("", "")` is the
/// sentinel meaning "no meaningful change region".
///
/// Serializes as a two-element `[left, right]` array, which is the on-disk
/// form of the persisted dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Toi(pub String, pub String);

impl Toi {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self(left.into(), right.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn left(&self) -> &str {
        &self.0
    }

    pub fn right(&self) -> &str {
        &self.1
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty() && self.1.is_empty()
    }

    /// Key under which this pair's embedding is cached.
    pub fn joined(&self) -> String {
        format!("{} {}", self.0, self.1)
    }

    pub fn total_len(&self) -> usize {
        self.0.len() + self.1.len()
    }
}

/// Resolved tokens of interest, keyed by example input. At most one entry
/// per distinct input; merges overwrite.
pub type ToiDict = BTreeMap<String, Toi>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_empty() {
        assert!(Toi::empty().is_empty());
        assert!(!Toi::new("a", "").is_empty());
        assert!(!Toi::new("", "b").is_empty());
    }

    #[test]
    fn toi_serializes_as_two_element_array() {
        let toi = Toi::new("served", "fresh");
        let json = serde_json::to_string(&toi).unwrap();
        assert_eq!(json, r#"["served","fresh"]"#);
        let back: Toi = serde_json::from_str(&json).unwrap();
        assert_eq!(back, toi);
    }
}
