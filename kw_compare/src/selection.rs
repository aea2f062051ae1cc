use serde::{Deserialize, Serialize};

use crate::KwError;

/// Optional limit on how many shows may be selected at once.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub cap: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// Selected identities in insertion order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the identity if absent, remove it if present. Adding past the
    /// policy cap is rejected and leaves the selection untouched.
    pub fn toggle(&mut self, identity: &str, policy: &SelectionPolicy) -> Result<Toggle, KwError> {
        if let Some(pos) = self.ids.iter().position(|id| id == identity) {
            self.ids.remove(pos);
            return Ok(Toggle::Removed);
        }
        if let Some(cap) = policy.cap {
            if self.ids.len() >= cap {
                return Err(KwError::SelectionFull { cap });
            }
        }
        self.ids.push(identity.to_string());
        Ok(Toggle::Added)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.ids.iter().any(|id| id == identity)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn as_set(selection: &Selection) -> HashSet<String> {
        selection.iter().map(str::to_string).collect()
    }

    #[test]
    fn double_toggle_restores_set() {
        let policy = SelectionPolicy::default();
        let mut selection = Selection::new();
        selection.toggle("a", &policy).unwrap();
        selection.toggle("b", &policy).unwrap();
        let before = as_set(&selection);

        assert_eq!(selection.toggle("c", &policy).unwrap(), Toggle::Added);
        assert_eq!(selection.toggle("c", &policy).unwrap(), Toggle::Removed);
        assert_eq!(as_set(&selection), before);

        assert_eq!(selection.toggle("a", &policy).unwrap(), Toggle::Removed);
        assert_eq!(selection.toggle("a", &policy).unwrap(), Toggle::Added);
        assert_eq!(as_set(&selection), before);
    }

    #[test]
    fn insertion_order_is_kept() {
        let policy = SelectionPolicy::default();
        let mut selection = Selection::new();
        for id in ["z", "a", "m"] {
            selection.toggle(id, &policy).unwrap();
        }
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn cap_rejects_additions_but_allows_removal() {
        let policy = SelectionPolicy { cap: Some(2) };
        let mut selection = Selection::new();
        selection.toggle("a", &policy).unwrap();
        selection.toggle("b", &policy).unwrap();
        let err = selection.toggle("c", &policy).unwrap_err();
        assert!(matches!(err, KwError::SelectionFull { cap: 2 }));
        assert_eq!(selection.len(), 2);
        assert!(!selection.contains("c"));
        assert_eq!(selection.toggle("a", &policy).unwrap(), Toggle::Removed);
        assert_eq!(selection.toggle("c", &policy).unwrap(), Toggle::Added);
    }

    #[test]
    fn clear_empties() {
        let policy = SelectionPolicy::default();
        let mut selection = Selection::new();
        selection.toggle("a", &policy).unwrap();
        selection.clear();
        assert!(selection.is_empty());
    }
}
