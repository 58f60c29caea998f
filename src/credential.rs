//! Account credentials used for basic authentication against the service.
use crate::error::{PepsError, Result};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identity: String,
    secret: String,
}

impl Credential {
    pub fn new(identity: &str, secret: &str) -> Self {
        Self {
            identity: identity.to_string(),
            secret: secret.to_string(),
        }
    }

    /// Reads the first line of `path`, expected to hold exactly two tokens:
    /// the account identity and its password.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PepsError::Credential {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).ok_or_else(|| PepsError::Credential {
            path: path.to_path_buf(),
            reason: "expected '<account> <password>' on the first line".to_string(),
        })
    }

    fn parse(content: &str) -> Option<Self> {
        let line = content.lines().next()?;
        let mut tokens = line.split_whitespace();
        let identity = tokens.next()?;
        let secret = tokens.next()?;
        if tokens.next().is_some() {
            return None;
        }
        Some(Self::new(identity, secret))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &"***")
            .finish()
    }
}
