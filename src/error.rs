use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PepsError {
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Error with credential file {path}: {reason}")]
    Credential { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Unable to read {what} {path}: {source}")]
    Document {
        what: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Url for production status not found in {0}")]
    JobIdNotFound(PathBuf),

    #[error("Catalog error {code}: {message}")]
    Catalog { code: String, message: String },

    #[error("Malformed catalog response: {0}")]
    MalformedCatalog(String),

    #[error("No product corresponds to selection criteria")]
    NoMatch,

    #[error("Wrong request status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("All {0} downloads failed")]
    AllDownloadsFailed(usize),

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used when reporting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Upstream,
    NotFound,
    PartialFailure,
    Transport,
}

impl PepsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingArgument(_)
            | Self::Credential { .. }
            | Self::Configuration(_)
            | Self::Document { .. } => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Catalog { .. } | Self::MalformedCatalog(_) | Self::HttpStatus { .. } => {
                ErrorKind::Upstream
            }
            Self::JobIdNotFound(_) | Self::NoMatch => ErrorKind::NotFound,
            Self::AllDownloadsFailed(_) => ErrorKind::PartialFailure,
            Self::Http(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Transport,
        }
    }

    /// Process exit code, distinct for every exit condition of the tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingArgument(_) => -1,
            Self::Credential { .. } => -2,
            Self::Document { .. } => -3,
            Self::JobIdNotFound(_) => -4,
            Self::Catalog { .. } | Self::MalformedCatalog(_) => -5,
            Self::NoMatch => -6,
            Self::HttpStatus { .. } => -7,
            Self::Validation(_) => -8,
            Self::Configuration(_) => -9,
            Self::AllDownloadsFailed(_) => -10,
            Self::Http(_) | Self::Io(_) | Self::Json(_) => -11,
        }
    }
}

pub type Result<T> = std::result::Result<T, PepsError>;
