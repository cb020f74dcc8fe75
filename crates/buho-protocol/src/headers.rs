//! Case-insensitive request headers.

use std::collections::HashMap;

/// Request headers with case-insensitive names.
///
/// Names are stored lowercased, so `Authorization` and `authorization`
/// refer to the same entry. Setting a name twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds headers carrying `Authorization: Bearer <credential>`.
    pub fn with_bearer(credential: &str) -> Self {
        let mut headers = Self::new();
        headers.insert("Authorization", format!("Bearer {credential}"));
        headers
    }

    /// Inserts or replaces a header.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Returns a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Extracts the bearer credential from the `Authorization` header.
    ///
    /// The scheme is matched case-insensitively. Returns `None` if the
    /// header is missing, uses another scheme, or carries an empty token.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.get("authorization")?.trim();
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}
