//! Walk, assemble and render a synthetic listing end to end

use std::cell::RefCell;
use std::collections::VecDeque;

use kindlenotes_core::output::format;
use kindlenotes_core::{
    collect_books, Config, FormatOptions, Listing, PageSource, ScrapeError, ScrapeResult,
    TextEncoding,
};
use reqwest::Url;
use serde_json::json;

struct FakeService {
    chunks: RefCell<VecDeque<&'static str>>,
    calls: RefCell<usize>,
    used_ids: RefCell<Vec<String>>,
}

impl FakeService {
    fn new(chunks: &[&'static str]) -> Self {
        Self {
            chunks: RefCell::new(chunks.iter().copied().collect()),
            calls: RefCell::new(0),
            used_ids: RefCell::new(Vec::new()),
        }
    }
}

impl PageSource for FakeService {
    fn fetch(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        referer: Option<&Url>,
    ) -> ScrapeResult<String> {
        assert_eq!(url.path(), "/your_highlights/next_book");
        assert_eq!(referer.map(Url::path), Some("/your_highlights"));
        assert!(query.iter().any(|(k, _)| *k == "current_offset"));

        *self.calls.borrow_mut() += 1;
        *self.used_ids.borrow_mut() = query
            .iter()
            .filter(|(k, _)| *k == "used_asins[]")
            .map(|(_, v)| v.to_string())
            .collect();
        Ok(self.chunks.borrow_mut().pop_front().unwrap_or("").to_string())
    }
}

const LISTING: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN">
<html><body>
<div id="allHighlightedBooks">
  <div class="bookMain yourHighlightsHeader" id="B000FC1PJI_1412112302">
    <span class="title"><a href="/work/moby-dick/B000FC1PJI">Moby-Dick</a></span>
    <span class="author">by Herman Melville</span>
  </div>
  <div class="highlightRow yourHighlight">
    <span class="highlight">Call me Ishmael.</span>
    <a class="readMore" href="/k/1">Read more at location 12</a>
    <span class="noteContent"></span>
  </div>
  <div class="highlightRow yourHighlight">
    <span class="context">whenever it is a damp, drizzly November in my soul</span>
    <a class="readMore" href="/k/2">Read more at location 1523</a>
    <span class="noteContent"> "relatable" </span>
  </div>
</div>
</body></html>"#;

const SECOND_BOOK: &str = r#"
  <div class="bookMain yourHighlightsHeader" id="B00K0OI42W_1412112999">
    <span class="title"><a href="/work/cafe/B00K0OI42W">Café Stories</a></span>
    <span class="author">by Anonymous</span>
  </div>
  <div class="spacer"></div>
"#;

const BOOK_WITH_NOTE: &str = r#"
  <div class="bookMain yourHighlightsHeader" id="B00Q2ABCDE_1412113500">
    <span class="title"><a href="/work/walden/B00Q2ABCDE">Walden</a></span>
    <span class="author">by Henry David Thoreau</span>
  </div>
  <div class="highlightRow yourHighlight">
    <span class="highlight">I went to the woods because I wished to live deliberately</span>
    <a class="readMore" href="/k/3">Read more at location 1290</a>
    <span class="noteContent"></span>
  </div>
"#;

fn listing() -> Listing {
    Listing {
        url: Url::parse("https://kindle.amazon.com/your_highlights").unwrap(),
        body: LISTING.to_string(),
    }
}

#[test]
fn test_two_books_across_pagination() {
    let service = FakeService::new(&[SECOND_BOOK, "\n"]);
    let books = collect_books(&service, &listing(), &Config::default()).unwrap();

    assert_eq!(*service.calls.borrow(), 2);
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].notes.len(), 2);
    assert!(books[1].notes.is_empty());

    let value = serde_json::to_value(&books).unwrap();
    assert_eq!(
        value,
        json!([
            {
                "asin": "B000FC1PJI",
                "url": "https://kindle.amazon.com/work/moby-dick/B000FC1PJI",
                "title": "Moby-Dick",
                "author": "Herman Melville",
                "notes": [
                    {"location": 12, "highlighted_text": "Call me Ishmael."},
                    {
                        "location": 1523,
                        "context": "whenever it is a damp, drizzly November in my soul",
                        "note": "relatable"
                    }
                ]
            },
            {
                "asin": "B00K0OI42W",
                "url": "https://kindle.amazon.com/work/cafe/B00K0OI42W",
                "title": "Café Stories",
                "author": "Anonymous",
                "notes": []
            }
        ])
    );
}

#[test]
fn test_three_books_across_two_chunks() {
    let service = FakeService::new(&[BOOK_WITH_NOTE, SECOND_BOOK, ""]);
    let books = collect_books(&service, &listing(), &Config::default()).unwrap();

    assert_eq!(*service.calls.borrow(), 3);
    assert_eq!(
        *service.used_ids.borrow(),
        ["B000FC1PJI", "B00Q2ABCDE", "B00K0OI42W"]
    );

    let asins: Vec<_> = books.iter().map(|b| b.asin.as_str()).collect();
    assert_eq!(asins, ["B000FC1PJI", "B00Q2ABCDE", "B00K0OI42W"]);
    assert_eq!(books[0].notes.len(), 2);
    assert_eq!(books[1].notes.len(), 1);
    assert_eq!(books[1].notes[0].location, Some(1290));
    assert_eq!(books[1].author.as_deref(), Some("Henry David Thoreau"));
    assert!(books[2].notes.is_empty());
}

#[test]
fn test_rendered_encodings_agree() {
    let service = FakeService::new(&[SECOND_BOOK]);
    let books = collect_books(&service, &listing(), &Config::default()).unwrap();

    let utf8 = format(&books, &FormatOptions::default()).unwrap();
    let escaped = format(
        &books,
        &FormatOptions {
            encoding: TextEncoding::parse("unicode-escape").unwrap(),
            ..FormatOptions::default()
        },
    )
    .unwrap();

    assert!(String::from_utf8(utf8.clone()).unwrap().contains("Café Stories"));
    assert!(String::from_utf8(escaped.clone()).unwrap().contains(r"Caf\u00e9 Stories"));

    let a: serde_json::Value = serde_json::from_slice(&utf8).unwrap();
    let b: serde_json::Value = serde_json::from_slice(&escaped).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_chunk_without_book_is_fatal() {
    let service = FakeService::new(&[r#"<div class="highlightRow"></div>"#]);
    let result = collect_books(&service, &listing(), &Config::default());
    assert!(matches!(result, Err(ScrapeError::DataIntegrity(_))));
}

#[test]
fn test_iteration_ceiling_from_config() {
    let service = FakeService::new(&[SECOND_BOOK, SECOND_BOOK, SECOND_BOOK]);
    let config = Config {
        max_pages: 2,
        ..Config::default()
    };
    let result = collect_books(&service, &listing(), &config);
    assert!(matches!(
        result,
        Err(ScrapeError::PaginationLimit { limit: 2 })
    ));
}
