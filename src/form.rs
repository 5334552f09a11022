//! Scraped form submission
//!
//! XFileSharing-style hosts gate the media URL behind a page of hidden
//! inputs that must be posted back verbatim:
//! - Collects every named input on the page (hidden tokens, file name)
//! - Lets the caller override or add fields
//! - Keeps field order stable for reproducible requests

use crate::html::input_fields;

/// Fields scraped from a page, ready to be posted back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, String)>,
}

impl Form {
    /// Collect all named inputs from the page
    #[must_use]
    pub fn from_page(html: &str) -> Self {
        Self {
            fields: input_fields(html),
        }
    }

    /// Set a field, replacing any scraped value
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Field pairs in submission order
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.fields.clone()
    }
}
