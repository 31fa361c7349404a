//! Pagination cursor walker
//!
//! The listing page only ships the first book. In a browser, scrolling to
//! the bottom calls a `next_book` endpoint that renders the next book's
//! markup on the server; this module calls that endpoint directly.
//!
//! ## Protocol
//!
//! ```text
//! GET <listing>/next_book?current_offset=<cursor>&used_asins[]=<id>...&upcoming_asins[]=
//! Referer: <listing>
//! ```
//!
//! - An empty (or whitespace-only) body means there are no more books.
//! - Otherwise the body is a fragment of sibling `<div>`s, one of which is a
//!   `bookMain` whose id is `<asin>_<cursor>`.
//!
//! Each request depends on the cursor returned by the previous one, so the
//! walk is strictly sequential.

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{ScrapeError, ScrapeResult};
use crate::markup::{classify, fragment_nodes, listing_nodes, sanitize, NodeKind, RawNode};
use crate::session::PageSource;

/// Default ceiling on pagination requests
pub const DEFAULT_MAX_PAGES: usize = 10_000;

const OFFSET_PARAM: &str = "current_offset";
const USED_IDS_PARAM: &str = "used_asins[]";
const UPCOMING_IDS_PARAM: &str = "upcoming_asins[]";

/// Pagination state sent with every request
///
/// The seen ids only ever grow; the cursor always belongs to the most
/// recently loaded book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    seen_ids: Vec<String>,
    cursor: String,
}

impl CursorState {
    pub fn new(id: impl Into<String>, cursor: impl Into<String>) -> Self {
        Self {
            seen_ids: vec![id.into()],
            cursor: cursor.into(),
        }
    }

    pub fn seen_ids(&self) -> &[String] {
        &self.seen_ids
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Record a newly loaded book
    pub fn advance(&mut self, id: String, cursor: String) {
        if self.seen_ids.contains(&id) {
            warn!(asin = %id, "Pagination returned a book that was already loaded");
        } else {
            self.seen_ids.push(id);
        }
        self.cursor = cursor;
    }

    /// Query pairs for the next request, in array-style encoding
    pub fn query(&self) -> Vec<(&str, &str)> {
        let mut query = Vec::with_capacity(self.seen_ids.len() + 2);
        query.push((OFFSET_PARAM, self.cursor.as_str()));
        query.extend(self.seen_ids.iter().map(|id| (USED_IDS_PARAM, id.as_str())));
        query.push((UPCOMING_IDS_PARAM, ""));
        query
    }
}

/// Outcome of one pagination request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The server has no more books
    End,
    /// One more book's worth of nodes
    Chunk {
        nodes: Vec<RawNode>,
        id: String,
        cursor: String,
    },
}

/// Seed the cursor from the first boundary node of the initial page
///
/// Returns `None` when the page holds no books at all.
pub fn initial_state(nodes: &[RawNode]) -> ScrapeResult<Option<CursorState>> {
    match nodes.iter().find(|n| classify(n) == NodeKind::Boundary) {
        Some(boundary) => {
            let (id, cursor) = boundary.composite_key()?;
            Ok(Some(CursorState::new(id, cursor)))
        }
        None => Ok(None),
    }
}

/// Walks the listing by repeatedly asking for the next book
pub struct Walker<'a, S: PageSource> {
    source: &'a S,
    listing_url: Url,
    endpoint: Url,
    max_pages: usize,
}

impl<'a, S: PageSource> Walker<'a, S> {
    /// `endpoint` is the `next_book` URL; `listing_url` is sent as referer
    pub fn new(source: &'a S, listing_url: Url, endpoint: Url) -> Self {
        Self {
            source,
            listing_url,
            endpoint,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Set the ceiling on pagination requests
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Collect every node of the listing, in document order
    ///
    /// Starts from the nodes of the initial page and appends each chunk the
    /// endpoint returns until it signals the end.
    pub fn walk(&self, initial_page: &str) -> ScrapeResult<Vec<RawNode>> {
        let mut nodes = listing_nodes(&sanitize(initial_page))?;

        let Some(mut state) = initial_state(&nodes)? else {
            info!("Listing holds no books; skipping pagination");
            return Ok(nodes);
        };

        let mut requests = 0;
        loop {
            if requests >= self.max_pages {
                return Err(ScrapeError::PaginationLimit {
                    limit: self.max_pages,
                });
            }
            requests += 1;

            match self.step(&state)? {
                Step::End => break,
                Step::Chunk {
                    nodes: chunk,
                    id,
                    cursor,
                } => {
                    nodes.extend(chunk);
                    state.advance(id, cursor);
                }
            }
        }

        info!(
            books = state.seen_ids().len(),
            requests,
            nodes = nodes.len(),
            "Finished loading highlights"
        );
        Ok(nodes)
    }

    /// Request the book after the one `state` points at
    pub fn step(&self, state: &CursorState) -> ScrapeResult<Step> {
        debug!(
            cursor = state.cursor(),
            seen = state.seen_ids().len(),
            "Requesting next book"
        );

        let body = self
            .source
            .fetch(&self.endpoint, &state.query(), Some(&self.listing_url))?;
        if body.trim().is_empty() {
            return Ok(Step::End);
        }

        let nodes = fragment_nodes(&sanitize(&body));
        let mut boundaries = nodes.iter().filter(|n| classify(n) == NodeKind::Boundary);

        let boundary = boundaries.next().ok_or_else(|| {
            ScrapeError::DataIntegrity(format!(
                "next_book response after offset {} has no book element",
                state.cursor()
            ))
        })?;
        let (id, cursor) = boundary.composite_key()?;

        let extra = boundaries.count();
        if extra > 0 {
            warn!(extra, "next_book response holds more than one book element");
        }

        Ok(Step::Chunk { nodes, id, cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    type Request = (String, Vec<(String, String)>, Option<String>);

    /// Serves scripted bodies in order, then empty bodies
    struct ScriptedSource {
        responses: RefCell<VecDeque<String>>,
        requests: RefCell<Vec<Request>>,
    }

    impl ScriptedSource {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: RefCell::new(responses.iter().map(|s| s.to_string()).collect()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl PageSource for ScriptedSource {
        fn fetch(
            &self,
            url: &Url,
            query: &[(&str, &str)],
            referer: Option<&Url>,
        ) -> ScrapeResult<String> {
            self.requests.borrow_mut().push((
                url.to_string(),
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                referer.map(Url::to_string),
            ));
            Ok(self.responses.borrow_mut().pop_front().unwrap_or_default())
        }
    }

    /// Always returns another book
    struct EndlessSource;

    impl PageSource for EndlessSource {
        fn fetch(&self, _: &Url, query: &[(&str, &str)], _: Option<&Url>) -> ScrapeResult<String> {
            let n = query.len();
            Ok(format!(r#"<div class="bookMain" id="B{}_{}"></div>"#, n, n))
        }
    }

    const INITIAL: &str = r#"<!DOCTYPE html><html><body><div id="allHighlightedBooks">
        <div class="bookMain" id="A1_100"></div>
        <div class="highlightRow"><span class="highlight">one</span></div>
    </div></body></html>"#;

    fn walker<S: PageSource>(source: &S) -> Walker<'_, S> {
        Walker::new(
            source,
            Url::parse("https://kindle.amazon.com/your_highlights").unwrap(),
            Url::parse("https://kindle.amazon.com/your_highlights/next_book").unwrap(),
        )
    }

    #[test]
    fn test_cursor_state_query() {
        let mut state = CursorState::new("A1", "100");
        state.advance("B2".to_string(), "200".to_string());

        assert_eq!(
            state.query(),
            vec![
                ("current_offset", "200"),
                ("used_asins[]", "A1"),
                ("used_asins[]", "B2"),
                ("upcoming_asins[]", ""),
            ]
        );
    }

    #[test]
    fn test_cursor_state_seen_ids_never_shrink() {
        let mut state = CursorState::new("A1", "1");
        state.advance("B2".to_string(), "2".to_string());
        state.advance("A1".to_string(), "3".to_string());

        assert_eq!(state.seen_ids(), ["A1", "B2"]);
        assert_eq!(state.cursor(), "3");
    }

    #[test]
    fn test_walk_collects_chunks_in_order() {
        let source = ScriptedSource::new(&[
            r#"<div class="bookMain" id="B2_200"></div><div class="highlightRow"></div>"#,
            r#"<div class="bookMain" id="C3_300"></div>"#,
            "  \n ",
        ]);

        let nodes = walker(&source).walk(INITIAL).unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| n.id().unwrap_or("-")).collect();
        assert_eq!(ids, ["A1_100", "-", "B2_200", "-", "C3_300"]);

        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 3);

        let (url, query, referer) = &requests[0];
        assert_eq!(url, "https://kindle.amazon.com/your_highlights/next_book");
        assert_eq!(
            referer.as_deref(),
            Some("https://kindle.amazon.com/your_highlights")
        );
        assert_eq!(query[0], ("current_offset".to_string(), "100".to_string()));

        let (_, last_query, _) = &requests[2];
        let used: Vec<_> = last_query
            .iter()
            .filter(|(k, _)| k == "used_asins[]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(used, ["A1", "B2", "C3"]);
        assert_eq!(last_query[0].1, "300");
        assert_eq!(
            last_query.last(),
            Some(&("upcoming_asins[]".to_string(), String::new()))
        );
    }

    #[test]
    fn test_seen_ids_grow_across_requests() {
        let source = ScriptedSource::new(&[
            r#"<div class="bookMain" id="B2_200"></div>"#,
            r#"<div class="bookMain" id="C3_300"></div>"#,
        ]);
        walker(&source).walk(INITIAL).unwrap();

        let counts: Vec<_> = source
            .requests
            .borrow()
            .iter()
            .map(|(_, q, _)| q.iter().filter(|(k, _)| k == "used_asins[]").count())
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts, [1, 2, 3]);
    }

    #[test]
    fn test_step_end_of_collection() {
        let source = ScriptedSource::new(&[""]);
        let state = CursorState::new("A1", "100");
        assert_eq!(walker(&source).step(&state).unwrap(), Step::End);
    }

    #[test]
    fn test_step_without_boundary_fails() {
        let source = ScriptedSource::new(&[r#"<div class="highlightRow"></div>"#]);
        let state = CursorState::new("A1", "100");
        assert!(matches!(
            walker(&source).step(&state),
            Err(ScrapeError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_walk_empty_library_makes_no_requests() {
        let source = ScriptedSource::new(&[]);
        let page = r#"<html><body><div id="allHighlightedBooks"></div></body></html>"#;

        let nodes = walker(&source).walk(page).unwrap();
        assert!(nodes.is_empty());
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn test_walk_stops_at_ceiling() {
        let result = walker(&EndlessSource).max_pages(5).walk(INITIAL);
        assert!(matches!(
            result,
            Err(ScrapeError::PaginationLimit { limit: 5 })
        ));
    }

    #[test]
    fn test_walk_ceiling_counts_final_request() {
        let chunks = [
            r#"<div class="bookMain" id="B2_200"></div>"#,
            r#"<div class="bookMain" id="C3_300"></div>"#,
        ];

        let source = ScriptedSource::new(&chunks);
        assert!(walker(&source).max_pages(3).walk(INITIAL).is_ok());

        let source = ScriptedSource::new(&chunks);
        assert!(walker(&source).max_pages(2).walk(INITIAL).is_err());
    }
}
