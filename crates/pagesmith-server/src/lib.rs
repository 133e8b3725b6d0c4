//! # pagesmith-server
//!
//! HTTP intake for Pagesmith.
//!
//! `POST /api/process-task` checks the shared secret, acknowledges at once and
//! hands the task to a [`TaskDispatcher`]. The workflow result is delivered to
//! the task's callback URL, never in the HTTP response.

mod dispatch;
mod server;

pub use dispatch::{RecordingDispatcher, SpawnDispatcher, TaskDispatcher};
pub use server::{router, serve, ApiError, AppState, SharedState, ACCEPTED_MESSAGE};
