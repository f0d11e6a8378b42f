//! Ordered header multimap.
//!
//! Names are case-folded to lowercase on the way in; lookups are
//! case-insensitive. Each name maps to the list of its comma-split values,
//! in the order they arrived.

/// The `Content-Length` header is not a non-negative integer, or
/// repeated with values that disagree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content-length `{0}`")]
pub struct InvalidContentLength(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Append a value, keeping values already present under the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        match self.position(name) {
            Some(idx) => self.entries[idx].1.push(value.into()),
            None => self
                .entries
                .push((name.to_ascii_lowercase(), vec![value.into()])),
        }
    }

    /// Append several values under one name.
    pub fn extend<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for value in values {
            self.append(name, value);
        }
    }

    /// Replace every value under `name` with a single value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = vec![value.into()],
            None => self
                .entries
                .push((name.to_ascii_lowercase(), vec![value.into()])),
        }
    }

    /// Insert only when no value is present yet.
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.insert(name, value);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let idx = self.position(name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|idx| self.entries[idx].1.as_slice())
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values under `name` re-joined with `", "`.
    pub fn joined(&self, name: &str) -> Option<String> {
        self.get(name).map(|values| values.join(", "))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Whether any value under `name` equals `token`, ignoring ASCII case.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get(name)
            .map(|values| values.iter().any(|v| v.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `Content-Length`. Absent header yields `Ok(None)`.
    pub fn content_length(&self) -> Result<Option<u64>, InvalidContentLength> {
        let Some(values) = self.get("content-length") else {
            return Ok(None);
        };

        let mut parsed: Option<u64> = None;
        for raw in values {
            let value = raw.trim();
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(InvalidContentLength(raw.clone()));
            }
            let len: u64 = value
                .parse()
                .map_err(|_| InvalidContentLength(raw.clone()))?;
            match parsed {
                Some(prev) if prev != len => return Err(InvalidContentLength(raw.clone())),
                _ => parsed = Some(len),
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_folded() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/plain");
        assert_eq!(headers.first("content-type"), Some("text/plain"));
        assert_eq!(headers.first("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["content-type"]);
    }

    #[test]
    fn append_keeps_order_and_values() {
        let mut headers = Headers::new();
        headers.append("accept", "text/html");
        headers.append("host", "example.com");
        headers.append("Accept", "application/json");
        assert_eq!(
            headers.get("accept").unwrap(),
            &["text/html".to_string(), "application/json".to_string()]
        );
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["accept", "host"]);
        assert_eq!(headers.joined("accept").unwrap(), "text/html, application/json");
    }

    #[test]
    fn insert_replaces() {
        let mut headers = Headers::new();
        headers.extend("x-list", ["a", "b"]);
        headers.insert("X-List", "c");
        assert_eq!(headers.get("x-list").unwrap(), &["c".to_string()]);
        headers.insert_if_absent("x-list", "d");
        assert_eq!(headers.first("x-list"), Some("c"));
    }

    #[test]
    fn connection_tokens() {
        let mut headers = Headers::new();
        headers.extend("connection", ["keep-alive", "Close"]);
        assert!(headers.has_token("connection", "close"));
        assert!(!headers.has_token("connection", "upgrade"));
    }

    #[test]
    fn content_length_parsing() {
        let mut headers = Headers::new();
        assert_eq!(headers.content_length(), Ok(None));

        headers.insert("content-length", "42");
        assert_eq!(headers.content_length(), Ok(Some(42)));

        headers.append("content-length", "42");
        assert_eq!(headers.content_length(), Ok(Some(42)));

        headers.append("content-length", "43");
        assert!(headers.content_length().is_err());

        headers.insert("content-length", "-1");
        assert!(headers.content_length().is_err());

        headers.insert("content-length", "+7");
        assert!(headers.content_length().is_err());
    }
}
