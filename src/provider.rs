//! Authenticated HTTP access to the PEPS service.
use crate::config::PepsConfig;
use crate::credential::Credential;
use crate::error::{PepsError, Result};
use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TextResponse {
    pub status: u16,
    pub body: String,
}

impl TextResponse {
    pub fn is_success(self: &Self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Bytes appended to the destination by `fetch_into`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// Body written from the first byte.
    Full(u64),
    /// Body appended after the bytes already present.
    Resumed(u64),
}

/// Complete length from the `Content-Range: bytes */N` of a 416 response.
fn unsatisfied_range_length(content_range: &str) -> Option<u64> {
    content_range
        .trim()
        .strip_prefix("bytes */")?
        .trim()
        .parse()
        .ok()
}

pub trait PepsOps {
    async fn get_text(self: &Self, url: &str) -> Result<TextResponse>;

    /// Streams the body of `url` into `file`. With `start_byte > 0` the
    /// remainder is requested; if the server ignores the range, or the file
    /// does not match the remote length, it is truncated and written from the
    /// start.
    async fn fetch_into(self: &Self, url: &str, start_byte: u64, file: &mut File) -> Result<Fetched>;
}

pub struct Peps {
    client: Client,
    credential: Credential,
}

impl Peps {
    pub fn new(config: &PepsConfig, credential: Credential) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client, credential })
    }

    fn get(self: &Self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(self.credential.identity(), Some(self.credential.secret()))
    }
}

impl PepsOps for Peps {
    async fn get_text(self: &Self, url: &str) -> Result<TextResponse> {
        debug!("GET {url}");
        let response = self.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TextResponse { status, body })
    }

    async fn fetch_into(self: &Self, url: &str, start_byte: u64, file: &mut File) -> Result<Fetched> {
        let mut start_byte = start_byte;
        let mut request = self.get(url);
        if start_byte > 0 {
            request = request.header(RANGE, format!("bytes={}-", start_byte));
        }
        let mut response = request.send().await?;

        if start_byte > 0 && response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            let total = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(unsatisfied_range_length);
            // partial file already holds the whole body
            if total == Some(start_byte) {
                return Ok(Fetched::Resumed(0));
            }
            debug!("Partial file does not match {url} ({total:?} bytes), restarting");
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            start_byte = 0;
            response = self.get(url).send().await?;
        }

        let resumed = match response.status() {
            StatusCode::PARTIAL_CONTENT if start_byte > 0 => true,
            status if status.is_success() => {
                if start_byte > 0 {
                    debug!("Range ignored by server, restarting {url}");
                    file.set_len(0)?;
                    file.seek(SeekFrom::Start(0))?;
                }
                false
            }
            status => {
                return Err(PepsError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                })
            }
        };

        let mut byte_count = 0;
        let body = response.bytes_stream();
        futures_util::pin_mut!(body);
        while let Some(bytes) = body.try_next().await? {
            file.write_all(&bytes)?;
            byte_count += bytes.len() as u64;
        }
        file.flush()?;

        Ok(if resumed {
            Fetched::Resumed(byte_count)
        } else {
            Fetched::Full(byte_count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let ok = TextResponse {
            status: 200,
            body: String::new(),
        };
        let missing = TextResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }

    #[test]
    fn test_unsatisfied_range_length() {
        assert_eq!(unsatisfied_range_length("bytes */1024"), Some(1024));
        assert_eq!(unsatisfied_range_length(" bytes */0 "), Some(0));
        assert_eq!(unsatisfied_range_length("bytes 0-99/1024"), None);
        assert_eq!(unsatisfied_range_length("bytes */*"), None);
    }

    #[test]
    fn test_client_builds() {
        let config = PepsConfig {
            accept_invalid_certs: true,
            ..Default::default()
        };
        assert!(Peps::new(&config, Credential::new("someone", "secret")).is_ok());
    }
}
