//! kindlenotes Core Library
//!
//! This crate logs into the Kindle highlights site, loads the whole
//! highlights listing by calling the endpoint behind its infinite scroll,
//! and turns the markup into structured book/highlight records.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let credentials = Credentials::from_file(Path::new("creds.json"))?;
//!
//! let books = scrape(&config, &credentials)?;
//! let bytes = output::format(&books, &FormatOptions::default())?;
//! Destination::Stdout.write(&bytes)?;
//! ```
//!
//! # Modules
//!
//! - `session`: Authenticated HTTP session (login, listing navigation)
//! - `pagination`: Cursor walker over the `next_book` endpoint
//! - `markup`: Sanitization, node classification and field extraction
//! - `assemble`: Folds the node stream into books
//! - `output`: JSON rendering, text encoding and destinations
//! - `models`: Book and highlight records
//! - `credentials`: Login credentials
//! - `config`: Application configuration

pub mod assemble;
pub mod config;
pub mod credentials;
pub mod error;
pub mod markup;
pub mod models;
pub mod output;
pub mod pagination;
pub mod scrape;
pub mod session;

pub use assemble::{assemble, Assembly};
pub use config::Config;
pub use credentials::Credentials;
pub use error::{ScrapeError, ScrapeResult};
pub use markup::{NodeKind, RawNode};
pub use models::{Book, Highlight, Passage};
pub use output::{ByteOrder, Destination, FormatOptions, NoteSort, TextEncoding};
pub use pagination::{CursorState, Step, Walker};
pub use scrape::{collect_books, scrape};
pub use session::{Listing, PageSource, Session};
