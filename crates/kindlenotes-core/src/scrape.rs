//! End-to-end scrape pipeline
//!
//! login -> listing -> pagination walk -> record assembly

use reqwest::Url;
use tracing::info;

use crate::assemble::assemble;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::Book;
use crate::pagination::Walker;
use crate::session::{Listing, PageSource, Session};

/// Log in and collect every highlighted book
pub fn scrape(config: &Config, credentials: &Credentials) -> ScrapeResult<Vec<Book>> {
    let session = Session::login(config, credentials)?;
    let listing = session.open_listing()?;
    collect_books(&session, &listing, config)
}

/// Walk the listing through `source` and assemble the books
pub fn collect_books<S: PageSource>(
    source: &S,
    listing: &Listing,
    config: &Config,
) -> ScrapeResult<Vec<Book>> {
    let endpoint = parse_url(&config.next_chunk_url())?;
    let base_url = parse_url(&config.base_url)?;

    let nodes = Walker::new(source, listing.url.clone(), endpoint)
        .max_pages(config.max_pages)
        .walk(&listing.body)?;

    let books = assemble(&nodes, &base_url);
    info!(
        books = books.len(),
        highlights = books.iter().map(|b| b.notes.len()).sum::<usize>(),
        "Assembled highlights"
    );
    Ok(books)
}

fn parse_url(url: &str) -> ScrapeResult<Url> {
    Url::parse(url).map_err(|_| ScrapeError::InvalidUrl(url.to_string()))
}
