//! # pagesmith-github
//!
//! GitHub side of publishing: creating or reusing a task's repository,
//! pushing generated content, and turning on Pages.

mod api;
mod pages;
mod repository;

pub use api::{GitHubClient, HostingApi, MockCall, MockHostingApi, MockReply};
pub use pages::{branch_not_yet_visible, PagesActivator};
pub use repository::{commit_message, RepositoryManager, RepositoryState, REMOTE_NAME};
