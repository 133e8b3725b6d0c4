//! Pure state machine for the task workflow
//!
//! No I/O here: `transition(state, event) -> (state, actions)` is
//! deterministic, and invalid transitions go to `Failed` instead of panicking.
//! The coordinator performs the actions and feeds the resulting events back.

use pagesmith_core::RepoBranch;

/// Workflow state for one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// Creating the task's working directory
    Preparing,
    /// Creating or cloning the repository
    RepoSetup,
    /// Asking the model for files and writing them out
    Generating,
    /// Committing and pushing
    Publishing,
    /// Turning on Pages for the pushed commit
    Activating { commit_sha: String },
    /// Reporting the result to the caller
    Notifying { commit_sha: String, pages_url: String },
    /// Site published and hosted; `notified` is false if delivery gave up
    Done {
        commit_sha: String,
        pages_url: String,
        notified: bool,
    },
    /// Absorbing failure state
    ///
    /// `published` holds the pushed commit when the failure came after
    /// publishing; that content stays on the remote.
    Failed {
        error: String,
        published: Option<String>,
    },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::RepoSetup => "repo_setup",
            Self::Generating => "generating",
            Self::Publishing => "publishing",
            Self::Activating { .. } => "activating",
            Self::Notifying { .. } => "notifying",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// Commit pushed by this run, if publishing got that far
    pub fn published_commit(&self) -> Option<&str> {
        match self {
            Self::Activating { commit_sha }
            | Self::Notifying { commit_sha, .. }
            | Self::Done { commit_sha, .. } => Some(commit_sha),
            Self::Failed { published, .. } => published.as_deref(),
            _ => None,
        }
    }
}

/// Events reported by the coordinator after performing an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    WorkspaceReady,
    RepositoryReady { branch: RepoBranch },
    FilesGenerated { count: usize },
    Published { commit_sha: String },
    Activated { pages_url: String },
    NotificationDelivered,
    /// Delivery gave up; not a workflow failure
    NotificationUndelivered { reason: String },
    /// A step failed fatally
    Error { message: String },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PrepareWorkspace,
    SetupRepository,
    /// Generate, then write files and attachments into the working copy
    GenerateFiles,
    PublishChanges,
    /// Wait for the push to settle, then activate Pages
    ActivateHosting,
    SendNotification { commit_sha: String, pages_url: String },
    LogActivity { message: String },
}

/// Initial state and the actions that start a run
pub fn begin() -> (WorkflowState, Vec<Action>) {
    (WorkflowState::Preparing, vec![Action::PrepareWorkspace])
}

/// Pure state transition function
pub fn transition(state: WorkflowState, event: Event) -> (WorkflowState, Vec<Action>) {
    match (state, event) {
        (WorkflowState::Preparing, Event::WorkspaceReady) => {
            (WorkflowState::RepoSetup, vec![Action::SetupRepository])
        }

        (WorkflowState::RepoSetup, Event::RepositoryReady { branch }) => (
            WorkflowState::Generating,
            vec![
                Action::LogActivity {
                    message: format!("Repository ready ({})", branch),
                },
                Action::GenerateFiles,
            ],
        ),

        (WorkflowState::Generating, Event::FilesGenerated { count }) => (
            WorkflowState::Publishing,
            vec![
                Action::LogActivity {
                    message: format!("{} files written", count),
                },
                Action::PublishChanges,
            ],
        ),

        (WorkflowState::Publishing, Event::Published { commit_sha }) => (
            WorkflowState::Activating {
                commit_sha: commit_sha.clone(),
            },
            vec![
                Action::LogActivity {
                    message: format!("Published commit {}", commit_sha),
                },
                Action::ActivateHosting,
            ],
        ),

        (WorkflowState::Activating { commit_sha }, Event::Activated { pages_url }) => (
            WorkflowState::Notifying {
                commit_sha: commit_sha.clone(),
                pages_url: pages_url.clone(),
            },
            vec![Action::SendNotification {
                commit_sha,
                pages_url,
            }],
        ),

        (
            WorkflowState::Notifying {
                commit_sha,
                pages_url,
            },
            Event::NotificationDelivered,
        ) => (
            WorkflowState::Done {
                commit_sha,
                pages_url,
                notified: true,
            },
            vec![Action::LogActivity {
                message: "Workflow complete".to_string(),
            }],
        ),

        (
            WorkflowState::Notifying {
                commit_sha,
                pages_url,
            },
            Event::NotificationUndelivered { reason },
        ) => (
            WorkflowState::Done {
                commit_sha,
                pages_url,
                notified: false,
            },
            vec![Action::LogActivity {
                message: format!("Workflow complete, notification not delivered: {}", reason),
            }],
        ),

        // Fatal errors from any non-terminal state
        (state, Event::Error { message }) if !state.is_terminal() => {
            let published = state.published_commit().map(str::to_string);
            let log = match &published {
                Some(sha) => format!(
                    "{} failed: {} (commit {} stays published)",
                    state.name(),
                    message,
                    sha
                ),
                None => format!("{} failed: {}", state.name(), message),
            };
            (
                WorkflowState::Failed {
                    error: message,
                    published,
                },
                vec![Action::LogActivity { message: log }],
            )
        }

        // Anything else is a driver bug
        (state, event) => {
            let published = state.published_commit().map(str::to_string);
            (
                WorkflowState::Failed {
                    error: format!(
                        "Invalid state transition: {:?} cannot handle event {:?}",
                        state, event
                    ),
                    published,
                },
                vec![],
            )
        }
    }
}
