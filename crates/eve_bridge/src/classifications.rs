use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Rule classification table, loaded at startup by the host and immutable
/// afterwards. Maps classtype shortnames (`trojan-activity`) to the
/// human-readable description routed with the alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classifications {
    table: HashMap<String, String>,
}

impl Classifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shortname: impl Into<String>, description: impl Into<String>) {
        self.table.insert(shortname.into(), description.into());
    }

    /// Unknown tokens resolve to themselves.
    pub fn resolve<'a>(&'a self, token: &'a str) -> &'a str {
        self.table.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<S: Into<String>, D: Into<String>> FromIterator<(S, D)> for Classifications {
    fn from_iter<I: IntoIterator<Item = (S, D)>>(iter: I) -> Self {
        let mut out = Self::default();
        for (shortname, description) in iter {
            out.insert(shortname, description);
        }
        out
    }
}
