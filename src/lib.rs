#![allow(async_fn_in_trait)]
pub mod catalog;
pub mod config;
pub mod credential;
pub mod download_plan;
pub mod error;
pub mod job_request;
pub mod provider;
pub mod query;
pub mod search;
pub mod status_log;
pub mod workflow;

pub use error::{PepsError, Result};
