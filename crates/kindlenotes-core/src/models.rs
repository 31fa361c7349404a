//! Data models for kindlenotes
//!
//! Defines the records produced by a scrape: books and the highlights
//! attached to them. Optional fields are left out of the serialized form
//! when absent.

use serde::Serialize;

/// A book that has at least one highlight in the listing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Book {
    /// ASIN of the book
    pub asin: String,
    /// Link to the book's page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Author, without the "by " attribution prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Highlights in listing order
    pub notes: Vec<Highlight>,
}

impl Book {
    /// Create a book with the given ASIN and no metadata
    pub fn new(asin: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            url: None,
            title: None,
            author: None,
            notes: Vec::new(),
        }
    }
}

/// The quoted passage of a highlight
///
/// The listing shows either the highlighted text itself or, for notes made
/// without a selection, the surrounding context. Never both.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Passage {
    HighlightedText(String),
    Context(String),
}

/// One highlight row
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Highlight {
    /// Location number within the book
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<u64>,
    #[serde(flatten)]
    pub passage: Option<Passage>,
    /// The reader's own note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Highlight {
    /// A highlight carrying no text, context nor note
    pub fn is_degenerate(&self) -> bool {
        self.passage.is_none() && self.note.is_none()
    }

    pub fn highlighted_text(&self) -> Option<&str> {
        match &self.passage {
            Some(Passage::HighlightedText(text)) => Some(text),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&str> {
        match &self.passage {
            Some(Passage::Context(text)) => Some(text),
            _ => None,
        }
    }
}
