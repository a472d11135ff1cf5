//! HTTP headers handling
//!
//! This module provides an ordered header collection used by both requests
//! and responses. Fields are kept as the raw bytes that went over (or will
//! go onto) the wire; nothing is case-normalized or re-encoded. Lookups come
//! in an exact-case and a case-insensitive flavor because servers are free
//! to answer with whatever casing they like.
//!
//! The `&str` lookups only see fields whose value is valid UTF-8. The
//! `_raw` forms see every byte.

use bytes::Bytes;
use std::fmt;

/// HTTP headers collection
///
/// Headers are stored in insertion order and support:
/// - Exact-case and case-insensitive lookups
/// - Multiple values for the same header name
/// - Replacing all values of a name in place
/// - Names and values that are not UTF-8
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(Bytes, Bytes)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Append a header
    ///
    /// Existing values for the same name are kept; the new pair goes last.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value): (String, String) = (name.into(), value.into());
        self.append_raw(name, value);
    }

    /// Append a header given as raw bytes
    pub fn append_raw(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replace every value of `name` (exact case)
    ///
    /// The new values take the position of the first existing entry, or are
    /// appended when `name` is not present yet. An empty `values` removes
    /// the header.
    pub fn set<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.as_bytes();
        let position = self
            .headers
            .iter()
            .position(|(n, _)| n == name)
            .unwrap_or(self.headers.len());

        self.headers.retain(|(n, _)| n != name);

        let position = position.min(self.headers.len());
        let replacement: Vec<(Bytes, Bytes)> = values
            .into_iter()
            .map(|v| {
                let value: String = v.into();
                (Bytes::copy_from_slice(name), Bytes::from(value))
            })
            .collect();
        self.headers.splice(position..position, replacement);
    }

    /// Get all UTF-8 values for a header (exact case)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        text(self.get_all_raw(name.as_bytes()))
    }

    /// Get the first value for a header (exact case), if it is UTF-8
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_raw(name.as_bytes())
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Get all UTF-8 values of every name matching case-insensitively
    pub fn get_all_ignore_case(&self, name: &str) -> Vec<&str> {
        text(self.get_all_raw_ignore_case(name.as_bytes()))
    }

    /// Get the first value for a header (exact case) as bytes
    pub fn get_raw(&self, name: &[u8]) -> Option<&[u8]> {
        self.get_all_raw(name).into_iter().next()
    }

    /// Get all values for a header (exact case) as bytes
    pub fn get_all_raw(&self, name: &[u8]) -> Vec<&[u8]> {
        self.headers
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| &v[..])
            .collect()
    }

    /// Get all values of every name matching case-insensitively as bytes
    pub fn get_all_raw_ignore_case(&self, name: &[u8]) -> Vec<&[u8]> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| &v[..])
            .collect()
    }

    /// Check if a header exists (exact case)
    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n == name.as_bytes())
    }

    /// Remove all instances of a header (exact case)
    pub fn remove(&mut self, name: &str) -> usize {
        let initial_len = self.headers.len();
        self.headers.retain(|(n, _)| n != name.as_bytes());
        initial_len - self.headers.len()
    }

    /// Get the number of header fields
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over all header fields in order, as raw bytes
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.headers.iter().map(|(n, v)| (&n[..], &v[..]))
    }
}

fn text(values: Vec<&[u8]>) -> Vec<&str> {
    values
        .into_iter()
        .filter_map(|v| std::str::from_utf8(v).ok())
        .collect()
}

/// One `name: value` line per field, invalid UTF-8 replaced
impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(
                f,
                "{}: {}",
                String::from_utf8_lossy(name),
                String::from_utf8_lossy(value)
            )?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Headers {
            headers: iter
                .into_iter()
                .map(|(n, v)| (Bytes::from(n), Bytes::from(v)))
                .collect(),
        }
    }
}

impl FromIterator<(Bytes, Bytes)> for Headers {
    fn from_iter<T: IntoIterator<Item = (Bytes, Bytes)>>(iter: T) -> Self {
        Headers {
            headers: iter.into_iter().collect(),
        }
    }
}
