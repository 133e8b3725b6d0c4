//! # pagesmith-core
//!
//! Core types for Pagesmith, the brief-to-hosted-site pipeline.
//!
//! A task arrives with a brief; Pagesmith asks a generative model for a small
//! static site, publishes it to a GitHub repository, turns on Pages and tells
//! the caller where everything lives.
//!
//! This crate holds what every other crate shares:
//! - The error type and its explicit [`ErrorKind`] tag
//! - Task, attachment and result types
//! - [`PagesmithConfig`], built once and injected everywhere
//! - The resilient call executor ([`retry`])

pub mod config;
mod error;
pub mod fail_open;
pub mod retry;
mod types;

pub use config::{
    CommitIdentity, Credentials, GitHubSettings, ModelSettings, PagesmithConfig, ServiceSettings,
};
pub use error::{ErrorKind, PagesmithError, Result};
pub use retry::{retry, Disposition, RetryPolicy};
pub use types::*;
