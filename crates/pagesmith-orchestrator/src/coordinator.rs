//! Task workflow coordinator
//!
//! Drives one task from working directory to hosted site by performing the
//! actions requested by [`crate::state_machine::transition`]. Steps run
//! strictly in sequence; retries live inside the components, never here.

use pagesmith_agent::{
    decode_all, image_parts, materialize, write_attachments, GeminiClient, GenerationClient,
    GenerativeModel,
};
use pagesmith_core::fail_open::fail_open;
use pagesmith_core::{
    PagesmithConfig, PagesmithError, RepoBranch, Result, RetryPolicy, Task, WorkflowResult,
};
use pagesmith_git::{GitCliFactory, WorkingCopyFactory};
use pagesmith_github::{
    GitHubClient, HostingApi, PagesActivator, RepositoryManager, RepositoryState,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::locks::RepoLocks;
use crate::notify::{CallbackTransport, HttpCallback, NotificationOutcome, Notifier};
use crate::state_machine::{begin, transition, Action, Event, WorkflowState};
use crate::workspace::TaskWorkspace;

/// External systems the coordinator talks to
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub hosting: Arc<dyn HostingApi>,
    pub model: Arc<dyn GenerativeModel>,
    pub callback: Arc<dyn CallbackTransport>,
    pub working_copies: Arc<dyn WorkingCopyFactory>,
}

impl Collaborators {
    /// GitHub, Gemini, HTTP callbacks and the `git` binary
    pub fn production(config: &PagesmithConfig) -> Result<Self> {
        Ok(Self {
            hosting: Arc::new(GitHubClient::new(config)?),
            model: Arc::new(GeminiClient::new(config)?),
            callback: Arc::new(HttpCallback::new()?),
            working_copies: Arc::new(
                GitCliFactory::new().with_secret(config.credentials.github_token.clone()),
            ),
        })
    }
}

/// How one run ended
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// Terminal state: `Done` or `Failed`
    pub state: WorkflowState,
    /// Present once publish and activation succeeded
    pub result: Option<WorkflowResult>,
    pub repo_branch: Option<RepoBranch>,
    pub notification: Option<NotificationOutcome>,
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.state, WorkflowState::Done { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            WorkflowState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// State owned by one run
#[derive(Default)]
struct Run {
    workspace: Option<TaskWorkspace>,
    repository: Option<RepositoryState>,
    result: Option<WorkflowResult>,
    notification: Option<NotificationOutcome>,
}

/// Sequences repository setup, generation, publish, activation and notification
#[derive(Debug, Clone)]
pub struct Coordinator {
    config: Arc<PagesmithConfig>,
    repositories: RepositoryManager,
    activator: PagesActivator,
    generation: GenerationClient,
    notifier: Notifier,
    working_copies: Arc<dyn WorkingCopyFactory>,
    locks: RepoLocks,
}

impl Coordinator {
    pub fn new(config: Arc<PagesmithConfig>, collaborators: Collaborators) -> Self {
        let temperature = config.service.model.temperature;
        Self {
            repositories: RepositoryManager::new(
                Arc::clone(&config),
                Arc::clone(&collaborators.hosting),
            ),
            activator: PagesActivator::new(Arc::clone(&config), collaborators.hosting),
            generation: GenerationClient::new(collaborators.model, temperature),
            notifier: Notifier::new(collaborators.callback),
            working_copies: collaborators.working_copies,
            locks: RepoLocks::new(),
            config,
        }
    }

    /// Coordinator wired to the real external systems
    pub fn from_config(config: Arc<PagesmithConfig>) -> Result<Self> {
        let collaborators = Collaborators::production(&config)?;
        Ok(Self::new(config, collaborators))
    }

    pub fn with_generation_policy(mut self, policy: RetryPolicy) -> Self {
        self.generation = self.generation.with_policy(policy);
        self
    }

    pub fn with_activation_policy(mut self, policy: RetryPolicy) -> Self {
        self.activator = self.activator.with_policy(policy);
        self
    }

    pub fn with_notification_policy(mut self, policy: RetryPolicy) -> Self {
        self.notifier = self.notifier.with_policy(policy);
        self
    }

    /// Share a lock registry with other coordinators
    pub fn with_locks(mut self, locks: RepoLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &PagesmithConfig {
        &self.config
    }

    /// Run one task to a terminal state
    ///
    /// Never returns an error: failures end in [`WorkflowState::Failed`] and
    /// are logged. Runs for the same repository wait for each other.
    #[instrument(skip(self, task), fields(task = %task.id, round = task.round))]
    pub async fn run(&self, task: &Task) -> WorkflowOutcome {
        info!("Task started");

        let mut run = Run::default();
        let state = match task.validate() {
            Ok(()) => {
                let _repo_guard = self.locks.acquire(&task.repo_name()).await;
                self.drive(task, &mut run).await
            }
            Err(e) => {
                error!("Task rejected: {}", e);
                WorkflowState::Failed {
                    error: e.to_string(),
                    published: None,
                }
            }
        };

        if let Some(workspace) = &run.workspace {
            if self.config.service.keep_workdirs {
                info!("Keeping working directory {}", workspace.path().display());
            } else {
                fail_open("working directory cleanup", || workspace.remove()).await;
            }
        }

        match &state {
            WorkflowState::Done { .. } => info!("Task succeeded"),
            WorkflowState::Failed { error, .. } => error!("Task failed: {}", error),
            _ => {}
        }

        WorkflowOutcome {
            state,
            result: run.result,
            repo_branch: run.repository.as_ref().map(RepositoryState::branch),
            notification: run.notification,
        }
    }

    async fn drive(&self, task: &Task, run: &mut Run) -> WorkflowState {
        let (mut state, mut actions) = begin();

        loop {
            let mut next = None;
            for action in actions {
                if let Some(event) = self.perform(action, task, run).await {
                    next = Some(event);
                }
            }

            if state.is_terminal() {
                return state;
            }

            let event = next.unwrap_or_else(|| Event::Error {
                message: format!("no action produced an event in {}", state.name()),
            });
            if let Event::Error { message } = &event {
                error!("Step {} failed: {}", state.name(), message);
            }
            (state, actions) = transition(state, event);
        }
    }

    /// Perform one action; only log actions produce no event
    async fn perform(&self, action: Action, task: &Task, run: &mut Run) -> Option<Event> {
        let step = match action {
            Action::PrepareWorkspace => self.prepare(task, run),
            Action::SetupRepository => self.setup_repository(task, run).await,
            Action::GenerateFiles => self.generate(task, run).await,
            Action::PublishChanges => self.publish(task, run).await,
            Action::ActivateHosting => self.activate(run).await,
            Action::SendNotification {
                commit_sha,
                pages_url,
            } => Ok(self.notify(task, run, commit_sha, pages_url).await),
            Action::LogActivity { message } => {
                info!("{}", message);
                return None;
            }
        };

        Some(step.unwrap_or_else(|e| Event::Error {
            message: self.config.redact(&e.to_string()),
        }))
    }

    fn prepare(&self, task: &Task, run: &mut Run) -> Result<Event> {
        let workspace = TaskWorkspace::prepare(&self.config.service.workspace_root, task)?;
        run.workspace = Some(workspace);
        Ok(Event::WorkspaceReady)
    }

    async fn setup_repository(&self, task: &Task, run: &mut Run) -> Result<Event> {
        let workspace = run
            .workspace
            .as_ref()
            .ok_or_else(|| missing("working directory"))?;
        let working_copy = self.working_copies.open(workspace.path());

        let repository = self.repositories.setup(task, working_copy).await?;
        let branch = repository.branch();
        run.repository = Some(repository);
        Ok(Event::RepositoryReady { branch })
    }

    async fn generate(&self, task: &Task, run: &mut Run) -> Result<Event> {
        let repository = run.repository.as_ref().ok_or_else(|| missing("repository"))?;

        let attachments = decode_all(&task.attachments)?;
        let files = self
            .generation
            .generate(task, image_parts(&attachments))
            .await?;

        let written = materialize(repository.path(), &files)?;
        write_attachments(repository.path(), &attachments)?;

        Ok(Event::FilesGenerated {
            count: written.files_created.len() + written.files_modified.len(),
        })
    }

    async fn publish(&self, task: &Task, run: &mut Run) -> Result<Event> {
        let repository = run.repository.as_ref().ok_or_else(|| missing("repository"))?;
        let commit_sha = self
            .repositories
            .publish(repository, &task.id, task.round)
            .await?;
        Ok(Event::Published { commit_sha })
    }

    async fn activate(&self, run: &mut Run) -> Result<Event> {
        let repository = run.repository.as_ref().ok_or_else(|| missing("repository"))?;

        let delay = self.config.activation_delay();
        if !delay.is_zero() {
            info!("Waiting {:?} for the push to settle", delay);
            tokio::time::sleep(delay).await;
        }

        let pages_url = self.activator.activate(repository.repo_name()).await?;
        Ok(Event::Activated { pages_url })
    }

    async fn notify(
        &self,
        task: &Task,
        run: &mut Run,
        commit_sha: String,
        pages_url: String,
    ) -> Event {
        let repo_url = self.config.repo_url(&task.repo_name());
        let result = WorkflowResult::published(task, repo_url, commit_sha, pages_url);

        let outcome = self.notifier.notify(&task.callback_url, &result).await;
        let event = match &outcome {
            NotificationOutcome::Delivered => Event::NotificationDelivered,
            NotificationOutcome::Exhausted { reason, .. }
            | NotificationOutcome::Rejected { reason } => Event::NotificationUndelivered {
                reason: reason.clone(),
            },
        };

        run.result = Some(result);
        run.notification = Some(outcome);
        event
    }
}

fn missing(what: &str) -> PagesmithError {
    PagesmithError::Other(format!("{} not prepared", what))
}
