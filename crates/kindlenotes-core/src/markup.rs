//! Highlights markup extraction
//!
//! The listing page is a flat sequence of sibling `<div>`s: a `bookMain`
//! div opens a book, the `highlightRow` divs after it belong to that book.
//! This module turns markup into owned [`RawNode`]s, classifies them and
//! pulls record fields out of them.
//!
//! Missing sub-elements are never fatal. They are logged and the
//! corresponding field is left empty.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{Book, Highlight, Passage};

/// Id of the element wrapping the listing on the initial page
pub const LISTING_CONTAINER_ID: &str = "allHighlightedBooks";
/// Class marking a book boundary
pub const BOOK_CLASS: &str = "bookMain";
/// Class marking a highlight row
pub const HIGHLIGHT_CLASS: &str = "highlightRow";

const TITLE_SELECTOR: &str = "span.title > a";
const AUTHOR_SELECTOR: &str = "span.author";
const LOCATION_SELECTOR: &str = "a.readMore";
const HIGHLIGHT_TEXT_SELECTOR: &str = "span.highlight";
const CONTEXT_SELECTOR: &str = "span.context";
const NOTE_SELECTOR: &str = "span.noteContent";

const AUTHOR_ATTRIBUTION: &str = "by ";

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!DOCTYPE[^>]*>").expect("doctype pattern is valid"));
static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("location pattern is valid"));

/// Strip the markup defects the service is known to produce
///
/// Pages arrive with a malformed doctype declaration and stray backslash
/// escapes; both are removed before anything is parsed.
pub fn sanitize(html: &str) -> String {
    DOCTYPE_RE.replace_all(html, "").replace('\\', "")
}

/// Split a boundary element id of the form `<id>_<cursor>`
///
/// The split happens on the first underscore, so the cursor may itself
/// contain underscores.
pub fn parse_composite_key(key: &str) -> ScrapeResult<(String, String)> {
    key.split_once('_')
        .map(|(id, cursor)| (id.to_string(), cursor.to_string()))
        .ok_or_else(|| {
            ScrapeError::DataIntegrity(format!(
                "book element id '{}' is not of the form <asin>_<offset>",
                key
            ))
        })
}

/// Kind of a node in the listing stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Boundary,
    ItemRow,
    Unrecognized,
}

/// An element lifted out of a parsed page
///
/// Owns its outer markup so nodes from different responses can live in one
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    id: Option<String>,
    classes: Vec<String>,
    markup: String,
}

impl RawNode {
    pub fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            id: element.value().id().map(str::to_string),
            classes: element.value().classes().map(str::to_string).collect(),
            markup: element.html(),
        }
    }

    /// Parse a single element from markup; `None` if it holds no element
    #[cfg(test)]
    pub(crate) fn parse(markup: &str) -> Option<Self> {
        let fragment = Html::parse_fragment(markup);
        fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .map(Self::from_element)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// The `(id, cursor)` pair carried by a boundary node
    pub fn composite_key(&self) -> ScrapeResult<(String, String)> {
        let id = self.id.as_deref().ok_or_else(|| {
            ScrapeError::DataIntegrity("book element has no id attribute".to_string())
        })?;
        parse_composite_key(id)
    }
}

/// Classify a node by its class markers
pub fn classify(node: &RawNode) -> NodeKind {
    if node.has_class(BOOK_CLASS) {
        NodeKind::Boundary
    } else if node.has_class(HIGHLIGHT_CLASS) {
        NodeKind::ItemRow
    } else {
        NodeKind::Unrecognized
    }
}

/// Collect the child `<div>`s of the listing container on a full page
pub fn listing_nodes(page: &str) -> ScrapeResult<Vec<RawNode>> {
    let document = Html::parse_document(page);

    let container = parse_selector(&format!("#{}", LISTING_CONTAINER_ID))?;
    if document.select(&container).next().is_none() {
        return Err(ScrapeError::DataIntegrity(format!(
            "listing page has no #{} element",
            LISTING_CONTAINER_ID
        )));
    }

    let children = parse_selector(&format!("#{} > div", LISTING_CONTAINER_ID))?;
    Ok(document.select(&children).map(RawNode::from_element).collect())
}

/// Collect the top-level `<div>`s of a markup fragment
pub fn fragment_nodes(fragment: &str) -> Vec<RawNode> {
    let fragment = Html::parse_fragment(fragment);
    fragment
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "div")
        .map(RawNode::from_element)
        .collect()
}

/// Extract the book described by a boundary node
///
/// Relative title links are resolved against `base_url`.
pub fn extract_boundary_fields(node: &RawNode, base_url: &Url) -> Book {
    let asin = match node.id() {
        Some(id) => match parse_composite_key(id) {
            Ok((asin, _)) => asin,
            Err(_) => {
                warn!(id, "Book element id has no offset part; using it whole as the ASIN");
                id.to_string()
            }
        },
        None => {
            warn!("Book element has no id attribute; ASIN left empty");
            String::new()
        }
    };

    let mut book = Book::new(asin);
    let fragment = Html::parse_fragment(node.markup());

    match select_first(&fragment, TITLE_SELECTOR) {
        Some(link) => {
            if let Some(href) = link.value().attr("href") {
                match base_url.join(href) {
                    Ok(url) => book.url = Some(url.to_string()),
                    Err(e) => warn!(asin = %book.asin, href, error = %e, "Unusable book link"),
                }
            }
            book.title = Some(element_text(link));
        }
        None => warn!(asin = %book.asin, "No title span element found for book"),
    }

    match select_first(&fragment, AUTHOR_SELECTOR) {
        Some(author) => {
            let author = element_text(author);
            let author = author
                .strip_prefix(AUTHOR_ATTRIBUTION)
                .map(str::to_string)
                .unwrap_or(author);
            book.author = Some(author);
        }
        None => warn!(asin = %book.asin, "No author span element found for book"),
    }

    book
}

/// Extract the highlight described by an item row node
///
/// `asin` is only used to give diagnostics some context.
pub fn extract_item_fields(node: &RawNode, asin: &str) -> Highlight {
    let fragment = Html::parse_fragment(node.markup());
    let mut highlight = Highlight::default();

    match select_first(&fragment, LOCATION_SELECTOR) {
        Some(link) => {
            highlight.location = parse_location(&element_text(link));
            if highlight.location.is_none() {
                warn!(asin, "Missing highlight location number for highlight");
            }
        }
        None => warn!(asin, "Missing highlight location link for highlight"),
    }

    if let Some(text) = select_first(&fragment, HIGHLIGHT_TEXT_SELECTOR) {
        highlight.passage = Some(Passage::HighlightedText(element_text(text)));
    } else if let Some(context) = select_first(&fragment, CONTEXT_SELECTOR) {
        highlight.passage = Some(Passage::Context(element_text(context)));
    } else {
        match highlight.location {
            Some(location) => warn!(
                asin,
                location, "No highlighted text or context found for highlight at location"
            ),
            None => warn!(asin, "No highlighted text or context found for highlight"),
        }
    }

    match select_first(&fragment, NOTE_SELECTOR) {
        Some(note) => highlight.note = clean_note(&note.text().collect::<String>()),
        None => warn!(asin, "No note element found for highlight"),
    }

    if highlight.is_degenerate() {
        warn!(asin, location = ?highlight.location, "Highlight has no text, context or note");
    }

    highlight
}

/// Location number from the trailing digits of a "read more" link text
pub fn parse_location(link_text: &str) -> Option<u64> {
    TRAILING_DIGITS_RE
        .find(link_text.trim())
        .and_then(|m| m.as_str().parse().ok())
}

/// Trim whitespace and quotes around a note; empty notes become `None`
pub fn clean_note(raw: &str) -> Option<String> {
    let note = raw.trim_matches(|c: char| c.is_whitespace() || c == '"');
    if note.is_empty() {
        None
    } else {
        Some(note.to_string())
    }
}

/// Whether a page carries the login error banner
pub fn has_login_error(page: &str) -> bool {
    let document = Html::parse_document(page);
    select_first(&document, "div.message.error").is_some()
}

fn parse_selector(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::DataIntegrity(format!("invalid selector '{}': {}", css, e)))
}

fn select_first<'a>(html: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    html.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
