//! Authenticated HTTP session
//!
//! Blocking `reqwest` client with a cookie store. Every request waits for
//! the previous one; the pagination protocol depends on that ordering.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::REFERER;
use reqwest::Url;
use tracing::{debug, info};

use super::form::{find_link, Form, FormMethod};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{ScrapeError, ScrapeResult};
use crate::markup::{has_login_error, sanitize};

/// Name of the sign-in form on the login page
const LOGIN_FORM_NAME: &str = "signIn";
const EMAIL_FIELD: &str = "email";
const PASSWORD_FIELD: &str = "password";

/// Source of raw page bodies
///
/// The seam between the pagination walker and the network.
pub trait PageSource {
    /// GET `url` with the given query pairs (repeated keys allowed) and an
    /// optional referer, returning the raw response body.
    fn fetch(&self, url: &Url, query: &[(&str, &str)], referer: Option<&Url>)
        -> ScrapeResult<String>;
}

/// The highlights listing page as first loaded
#[derive(Debug, Clone)]
pub struct Listing {
    /// Canonical listing URL, used as referer for pagination requests
    pub url: Url,
    /// Sanitized page body
    pub body: String,
}

/// Logged-in session with the service
pub struct Session {
    client: Client,
    base_url: Url,
    login_url: Url,
    listing_path: String,
    listing_url: Url,
}

impl Session {
    /// Create an unauthenticated session
    pub fn new(config: &Config) -> ScrapeResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| ScrapeError::transport("build_client", "", e))?;

        Ok(Self {
            client,
            base_url: parse_url(&config.base_url)?,
            login_url: parse_url(&config.login_url)?,
            listing_path: config.listing_path.clone(),
            listing_url: parse_url(&config.listing_url())?,
        })
    }

    /// Create a session and log in with the given credentials
    pub fn login(config: &Config, credentials: &Credentials) -> ScrapeResult<Self> {
        let session = Self::new(config)?;
        session.sign_in(credentials)?;
        Ok(session)
    }

    /// Submit the sign-in form
    ///
    /// The service reports bad credentials with an error banner rather than
    /// a status code, so both are checked.
    pub fn sign_in(&self, credentials: &Credentials) -> ScrapeResult<()> {
        debug!(url = %self.login_url, "Loading login page");
        let response = self.send("login_page", self.client.get(self.login_url.clone()))?;
        let page_url = response.url().clone();
        let page = sanitize(&read_body("login_page", response)?);

        let mut form = Form::find(&page, &page_url, LOGIN_FORM_NAME)?
            .ok_or_else(|| self.auth_error("sign-in form not found on login page"))?;
        form.set(EMAIL_FIELD, &credentials.email);
        form.set(PASSWORD_FIELD, &credentials.password);

        let request = match form.method {
            FormMethod::Post => self.client.post(form.action.clone()).form(&form.fields),
            FormMethod::Get => self.client.get(form.action.clone()).query(&form.fields),
        };
        let response = request
            .header(REFERER, page_url.as_str())
            .send()
            .map_err(|e| ScrapeError::transport("login_submit", form.action.as_str(), e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(self.auth_error(&format!("server answered HTTP {}", status.as_u16())));
        }

        let body = sanitize(&read_body("login_submit", response)?);
        if has_login_error(&body) {
            return Err(self.auth_error("the service rejected the email/password"));
        }

        info!(email = %credentials.email, "Logged in");
        Ok(())
    }

    /// Load the highlights listing
    ///
    /// The listing cannot be opened directly; it has to be reached through
    /// the link on the home page, the way a browser would.
    pub fn open_listing(&self) -> ScrapeResult<Listing> {
        let response = self.send("home", self.client.get(self.base_url.clone()))?;
        let home_url = response.url().clone();
        let home = sanitize(&read_body("home", response)?);

        let link = find_link(&home, &home_url, &self.listing_path, &self.listing_url)
            .ok_or_else(|| {
                ScrapeError::DataIntegrity(format!(
                    "no link to {} found on {}",
                    self.listing_path, home_url
                ))
            })?;

        debug!(url = %link, "Following highlights link");
        let response = self.send(
            "listing",
            self.client.get(link).header(REFERER, home_url.as_str()),
        )?;
        let body = sanitize(&read_body("listing", response)?);

        Ok(Listing {
            url: self.listing_url.clone(),
            body,
        })
    }

    fn send(&self, stage: &'static str, request: RequestBuilder) -> ScrapeResult<Response> {
        let response = request.send().map_err(|e| {
            let url = e.url().map(Url::to_string).unwrap_or_default();
            ScrapeError::transport(stage, url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                stage,
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn auth_error(&self, reason: &str) -> ScrapeError {
        ScrapeError::Auth {
            url: self.login_url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl PageSource for Session {
    fn fetch(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        referer: Option<&Url>,
    ) -> ScrapeResult<String> {
        let mut request = self.client.get(url.clone()).query(query);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer.as_str());
        }
        let response = self.send("next_book", request)?;
        read_body("next_book", response)
    }
}

fn read_body(stage: &'static str, response: Response) -> ScrapeResult<String> {
    let url = response.url().to_string();
    response
        .text()
        .map_err(|e| ScrapeError::transport(stage, url, e))
}

fn parse_url(url: &str) -> ScrapeResult<Url> {
    Url::parse(url).map_err(|_| ScrapeError::InvalidUrl(url.to_string()))
}
