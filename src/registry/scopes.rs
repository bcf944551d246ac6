//! Scope sets shared by applications, grants and tokens.
//!
//! A [`Scopes`] value keeps scope names in first-seen order without duplicates.
//! The OAuth wire form is a single space-delimited string, which is what
//! [`Scopes::from_string`] parses and [`std::fmt::Display`] produces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, de-duplicated set of scope names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Scopes(Vec<String>);

impl Scopes {
    /// Create an empty scope set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-delimited scope string
    pub fn from_string(scopes: &str) -> Self {
        scopes.split_whitespace().collect()
    }

    /// Add space-delimited scopes, ignoring blanks and duplicates
    pub fn add(&mut self, scope: impl Into<String>) {
        let scope = scope.into();
        for name in scope.split_whitespace() {
            if !self.exists(name) {
                self.0.push(name.to_string());
            }
        }
    }

    /// Whether the named scope is in the set
    pub fn exists(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    /// Whether every scope in `other` is also in this set
    pub fn has_scopes(&self, other: &Scopes) -> bool {
        other.iter().all(|scope| self.exists(scope))
    }

    /// Scopes present in either set, keeping this set's order first
    pub fn union(&self, other: &Scopes) -> Scopes {
        self.iter().chain(other.iter()).map(String::as_str).collect()
    }

    /// Scopes present in both sets, in this set's order
    pub fn intersection(&self, other: &Scopes) -> Scopes {
        self.iter()
            .filter(|scope| other.exists(scope))
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl<S: AsRef<str>> FromIterator<S> for Scopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut scopes = Scopes::new();
        for scope in iter {
            scopes.add(scope.as_ref());
        }
        scopes
    }
}

impl From<Vec<String>> for Scopes {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Scopes> for Vec<String> {
    fn from(value: Scopes) -> Self {
        value.0
    }
}

impl From<&str> for Scopes {
    fn from(value: &str) -> Self {
        Scopes::from_string(value)
    }
}

impl<'a> IntoIterator for &'a Scopes {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
