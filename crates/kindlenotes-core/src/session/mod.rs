//! Session client for the highlights service
//!
//! ## Flow
//!
//! 1. Load the login page and submit the `signIn` form
//! 2. Load the home page and follow its link to the highlights listing
//! 3. Hand the listing to the pagination walker, which keeps calling back
//!    through [`PageSource`]
//!
//! Session state (cookies) lives in the [`Session`] value that is passed to
//! each of these steps.

mod client;
mod form;

pub use client::{Listing, PageSource, Session};
pub use form::{find_link, Form, FormMethod};
