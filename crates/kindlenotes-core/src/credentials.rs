//! Login credentials
//!
//! Credentials come either from an interactive prompt (handled by the CLI)
//! or from a JSON file of the form `{"email": "...", "password": "..."}`.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ScrapeError, ScrapeResult};

/// Email/password pair used once to log in
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Build credentials, rejecting blank values
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> ScrapeResult<Self> {
        let credentials = Self {
            email: email.into(),
            password: password.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Read credentials from a JSON file
    pub fn from_file(path: &Path) -> ScrapeResult<Self> {
        if !path.is_file() {
            return Err(ScrapeError::Credentials(format!(
                "No creds file found at {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse credentials from JSON text
    pub fn from_json(content: &str) -> ScrapeResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|_| ScrapeError::Credentials("Creds file is not valid JSON".to_string()))?;

        let credentials: Credentials = serde_json::from_value(value).map_err(|_| {
            ScrapeError::Credentials(
                "Could not find email/password string keys in creds JSON".to_string(),
            )
        })?;
        credentials.validate()?;
        Ok(credentials)
    }

    fn validate(&self) -> ScrapeResult<()> {
        if self.email.trim().is_empty() || self.password.trim().is_empty() {
            return Err(ScrapeError::Credentials(
                "email and password must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_from_json() {
        let creds =
            Credentials::from_json(r#"{"email": "reader@example.com", "password": "hunter2"}"#)
                .unwrap();
        assert_eq!(creds.email, "reader@example.com");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_from_json_extra_keys_ignored() {
        let creds =
            Credentials::from_json(r#"{"email": "a@b.c", "password": "p", "note": 1}"#).unwrap();
        assert_eq!(creds.email, "a@b.c");
    }

    #[test]
    fn test_from_json_missing_key() {
        let err = Credentials::from_json(r#"{"email": "a@b.c"}"#).unwrap_err();
        assert!(err.to_string().contains("email/password"));
    }

    #[test]
    fn test_from_json_wrong_type() {
        assert!(Credentials::from_json(r#"{"email": "a@b.c", "password": 1234}"#).is_err());
    }

    #[test]
    fn test_from_json_invalid() {
        let err = Credentials::from_json("email=a@b.c").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("creds.json");
        fs::write(&path, r#"{"email": "a@b.c", "password": "p"}"#).unwrap();

        let creds = Credentials::from_file(&path).unwrap();
        assert_eq!(creds.email, "a@b.c");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempdir().unwrap();
        let err = Credentials::from_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ScrapeError::Credentials(_)));
    }

    #[test]
    fn test_blank_rejected() {
        assert!(Credentials::new("  ", "secret").is_err());
        assert!(Credentials::new("a@b.c", "").is_err());
        assert!(Credentials::new("a@b.c", "secret").is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("a@b.c", "hunter2").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("a@b.c"));
        assert!(!debug.contains("hunter2"));
    }
}
