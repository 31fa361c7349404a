//! Form and link discovery
//!
//! Emulates the two bits of browser behaviour the login flow needs:
//! submitting a named form with its hidden fields intact, and following a
//! link found on a page.

use reqwest::Url;
use scraper::{Html, Selector};

use crate::error::{ScrapeError, ScrapeResult};

/// HTTP method a form submits with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A form ready to be submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub action: Url,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

impl Form {
    /// Find the form called `name` on a page
    ///
    /// The action is resolved against `page_url`; a form without an action
    /// submits back to the page itself. Returns `None` if no such form exists.
    pub fn find(page: &str, page_url: &Url, name: &str) -> ScrapeResult<Option<Self>> {
        let document = Html::parse_document(page);
        let form_selector = selector(&format!(r#"form[name="{}"]"#, name))?;
        let input_selector = selector("input[name]")?;

        let Some(form) = document.select(&form_selector).next() else {
            return Ok(None);
        };

        let action = match form.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => page_url
                .join(action)
                .map_err(|_| ScrapeError::InvalidUrl(action.to_string()))?,
            _ => page_url.clone(),
        };

        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("get") => FormMethod::Get,
            _ => FormMethod::Post,
        };

        let fields = form
            .select(&input_selector)
            .filter(|input| is_successful_control(input.value()))
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Ok(Some(Self {
            action,
            method,
            fields,
        }))
    }

    /// Set a field, replacing any existing value
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    #[cfg(test)]
    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Find a link on a page pointing at `target`
///
/// Matches either the literal `href` or its resolved absolute URL.
pub fn find_link(page: &str, page_url: &Url, href: &str, target: &Url) -> Option<Url> {
    let document = Html::parse_document(page);
    let links = Selector::parse("a[href]").ok()?;

    document
        .select(&links)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|candidate| {
            let resolved = page_url.join(candidate).ok()?;
            (candidate == href || resolved == *target).then_some(resolved)
        })
}

// Buttons only submit when clicked; unchecked boxes never submit.
fn is_successful_control(input: &scraper::node::Element) -> bool {
    let kind = input.attr("type").unwrap_or("text").to_ascii_lowercase();
    match kind.as_str() {
        "submit" | "image" | "button" | "reset" | "file" => false,
        "checkbox" | "radio" => input.attr("checked").is_some(),
        _ => input.attr("disabled").is_none(),
    }
}

fn selector(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::DataIntegrity(format!("invalid selector '{}': {}", css, e)))
}
