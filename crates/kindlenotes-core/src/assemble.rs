//! Record assembly
//!
//! Folds the flat node stream into books. A boundary node opens a new book;
//! item rows attach to the most recently opened one.

use reqwest::Url;
use tracing::warn;

use crate::markup::{classify, extract_boundary_fields, extract_item_fields, NodeKind, RawNode};
use crate::models::Book;

/// Accumulator for the fold; the current book is the last one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    books: Vec<Book>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one node and return the next state
    pub fn apply(mut self, node: &RawNode, base_url: &Url) -> Self {
        match classify(node) {
            NodeKind::Boundary => {
                self.books.push(extract_boundary_fields(node, base_url));
            }
            NodeKind::ItemRow => match self.books.last_mut() {
                Some(book) => {
                    let highlight = extract_item_fields(node, &book.asin);
                    book.notes.push(highlight);
                }
                None => warn!("Skipping highlight that appears before any book"),
            },
            NodeKind::Unrecognized => {
                warn!(markup = node.markup(), "Skipping unrecognized element");
            }
        }
        self
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn into_books(self) -> Vec<Book> {
        self.books
    }
}

/// Assemble books from nodes in document order
pub fn assemble(nodes: &[RawNode], base_url: &Url) -> Vec<Book> {
    nodes
        .iter()
        .fold(Assembly::new(), |state, node| state.apply(node, base_url))
        .into_books()
}
