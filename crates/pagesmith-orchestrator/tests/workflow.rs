//! End-to-end workflow runs against in-memory collaborators

use pagesmith_agent::{MockModel, ModelReply};
use pagesmith_core::{Attachment, PagesmithConfig, RepoBranch, RetryPolicy, Task};
use pagesmith_git::{MemoryFactory, MemoryRemotes};
use pagesmith_github::{MockCall, MockHostingApi, MockReply};
use pagesmith_orchestrator::{
    Collaborators, Coordinator, NotificationOutcome, RecordingCallback, WorkflowState,
};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _root: TempDir,
    config: Arc<PagesmithConfig>,
    remotes: MemoryRemotes,
    hosting: Arc<MockHostingApi>,
    model: Arc<MockModel>,
    callback: Arc<RecordingCallback>,
}

impl Harness {
    fn new() -> Self {
        Self::build(
            |_| {},
            |hosting| hosting,
            MockModel::always(ModelReply::site("Hello")),
            RecordingCallback::new(),
        )
    }

    fn build(
        tune: impl FnOnce(&mut PagesmithConfig),
        script: impl FnOnce(MockHostingApi) -> MockHostingApi,
        model: MockModel,
        callback: RecordingCallback,
    ) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = PagesmithConfig::for_account("octo");
        config.service.workspace_root = root.path().to_path_buf();
        config.service.github.activation_delay_secs = 0;
        tune(&mut config);
        let config = Arc::new(config);

        let remotes = MemoryRemotes::new();
        let hosting = Arc::new(script(MockHostingApi::backed_by(
            remotes.clone(),
            Arc::clone(&config),
        )));

        Self {
            _root: root,
            config,
            remotes,
            hosting,
            model: Arc::new(model),
            callback: Arc::new(callback),
        }
    }

    fn coordinator(&self) -> Coordinator {
        let collaborators = Collaborators {
            hosting: self.hosting.clone(),
            model: self.model.clone(),
            callback: self.callback.clone(),
            working_copies: Arc::new(MemoryFactory::new(self.remotes.clone())),
        };
        Coordinator::new(Arc::clone(&self.config), collaborators)
            .with_generation_policy(RetryPolicy::immediate(3))
            .with_activation_policy(RetryPolicy::immediate(5))
            .with_notification_policy(RetryPolicy::immediate(3))
    }

    fn remote(&self) -> String {
        self.config.authenticated_remote("demo")
    }

    fn workdirs(&self) -> usize {
        std::fs::read_dir(&self.config.service.workspace_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn task(round: u32, brief: &str) -> Task {
    Task {
        email: "student@example.com".to_string(),
        secret: "test-secret".to_string(),
        id: "demo".to_string(),
        round,
        nonce: format!("nonce-{}", round),
        brief: brief.to_string(),
        checks: vec!["page has a heading".to_string()],
        callback_url: "https://evaluator.example.com/notify".to_string(),
        attachments: Vec::new(),
    }
}

#[tokio::test]
async fn test_round_one_creates_publishes_and_notifies() {
    let h = Harness::new();

    let outcome = h.coordinator().run(&task(1, "a hello-world page")).await;

    assert!(outcome.is_success(), "{:?}", outcome.error());
    assert_eq!(outcome.repo_branch, Some(RepoBranch::Created));
    assert_eq!(h.hosting.count(MockCall::CreateRepository), 1);
    assert_eq!(h.model.call_count(), 1);

    let history = h.remotes.history(&h.remote());
    assert_eq!(history.len(), 1);
    assert!(history[0].message.contains("demo"));
    assert!(history[0].message.contains('1'));
    for file in ["index.html", "README.md", "LICENSE"] {
        assert!(history[0].tree.contains_key(file), "{file} not committed");
    }

    let result = outcome.result.unwrap();
    assert_eq!(result.commit_sha, history[0].id);
    assert_eq!(result.pages_url, "https://octo.github.io/demo/");
    assert_eq!(result.repo_url, "https://github.com/octo/demo");

    let delivered = h.callback.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "https://evaluator.example.com/notify");
    assert_eq!(delivered[0].1.nonce, "nonce-1");
    assert_eq!(delivered[0].1.task, "demo");
    assert_eq!(delivered[0].1.round, 1);
    assert_eq!(outcome.notification, Some(NotificationOutcome::Delivered));
}

#[tokio::test]
async fn test_round_two_clones_and_commits_on_top() {
    let h = Harness::build(
        |_| {},
        |hosting| hosting,
        MockModel::new().with_replies([
            ModelReply::site("Hello"),
            ModelReply::site("Contact form"),
        ]),
        RecordingCallback::new(),
    );
    let coordinator = h.coordinator();

    let first = coordinator.run(&task(1, "a hello-world page")).await;
    let second = coordinator.run(&task(2, "add a contact form")).await;

    assert!(first.is_success());
    assert!(second.is_success(), "{:?}", second.error());
    assert_eq!(second.repo_branch, Some(RepoBranch::Cloned));
    assert_eq!(h.hosting.count(MockCall::CreateRepository), 1);

    let history = h.remotes.history(&h.remote());
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.result.as_ref().unwrap().commit_sha);
    assert_eq!(history[1].message, "Task: demo | Round: 2");

    let first_url = first.result.unwrap().pages_url;
    let second_url = second.result.unwrap().pages_url;
    assert_eq!(first_url, second_url);
    assert_eq!(h.hosting.count(MockCall::UpdatePages), 1);

    let delivered = h.callback.delivered();
    assert_eq!(delivered[1].1.nonce, "nonce-2");
}

#[tokio::test]
async fn test_generation_failure_stops_before_publish() {
    let h = Harness::build(
        |_| {},
        |hosting| hosting,
        MockModel::always(ModelReply::Transport),
        RecordingCallback::new(),
    );

    let outcome = h.coordinator().run(&task(1, "a hello-world page")).await;

    assert!(!outcome.is_success());
    assert!(matches!(
        outcome.state,
        WorkflowState::Failed { published: None, .. }
    ));
    assert!(outcome.result.is_none());
    assert_eq!(h.model.call_count(), 3);
    assert!(h.remotes.history(&h.remote()).is_empty());
    assert_eq!(h.callback.attempts(), 0);
}

#[tokio::test]
async fn test_activation_failure_keeps_published_commit() {
    let h = Harness::build(
        |_| {},
        |hosting| hosting.with_replies(MockCall::CreatePages, [MockReply::Status(500)]),
        MockModel::always(ModelReply::site("Hello")),
        RecordingCallback::new(),
    );

    let outcome = h.coordinator().run(&task(1, "a hello-world page")).await;

    let history = h.remotes.history(&h.remote());
    assert_eq!(history.len(), 1);
    match &outcome.state {
        WorkflowState::Failed { published, .. } => {
            assert_eq!(published.as_deref(), Some(history[0].id.as_str()));
        }
        other => panic!("unexpected state: {:?}", other),
    }
    assert!(outcome.result.is_none());
    assert_eq!(h.callback.attempts(), 0);
}

#[tokio::test]
async fn test_undeliverable_notification_is_still_success() {
    let h = Harness::build(
        |_| {},
        |hosting| hosting,
        MockModel::always(ModelReply::site("Hello")),
        RecordingCallback::unreachable(),
    );

    let outcome = h.coordinator().run(&task(1, "a hello-world page")).await;

    assert!(outcome.is_success());
    assert!(matches!(
        outcome.state,
        WorkflowState::Done { notified: false, .. }
    ));
    assert!(matches!(
        outcome.notification,
        Some(NotificationOutcome::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(h.callback.attempts(), 3);
}

#[tokio::test]
async fn test_working_directory_cleanup() {
    let removed = Harness::new();
    removed.coordinator().run(&task(1, "a hello-world page")).await;
    assert_eq!(removed.workdirs(), 0);

    let kept = Harness::build(
        |config| config.service.keep_workdirs = true,
        |hosting| hosting,
        MockModel::always(ModelReply::site("Hello")),
        RecordingCallback::new(),
    );
    kept.coordinator().run(&task(1, "a hello-world page")).await;
    assert_eq!(kept.workdirs(), 1);
}

#[tokio::test]
async fn test_invalid_task_touches_nothing() {
    let h = Harness::new();

    let outcome = h.coordinator().run(&task(0, "a hello-world page")).await;

    assert!(outcome.error().unwrap().contains("round"));
    assert!(h.hosting.calls().is_empty());
    assert_eq!(h.model.call_count(), 0);
    assert_eq!(h.workdirs(), 0);
}

#[tokio::test]
async fn test_path_like_task_id_is_rejected() {
    let h = Harness::new();
    let mut task = task(1, "a hello-world page");
    task.id = "../escaped".to_string();

    let outcome = h.coordinator().run(&task).await;

    assert!(outcome.error().unwrap().contains("repository name"));
    assert!(h.hosting.calls().is_empty());
    assert_eq!(h.workdirs(), 0);
}

#[tokio::test]
async fn test_attachments_are_committed() {
    let h = Harness::new();
    let mut task = task(1, "chart the data");
    task.attachments.push(Attachment {
        name: "data.csv".to_string(),
        url: "data:text/csv;base64,YSxiCjEsMg==".to_string(),
    });

    let outcome = h.coordinator().run(&task).await;

    assert!(outcome.is_success(), "{:?}", outcome.error());
    let history = h.remotes.history(&h.remote());
    assert_eq!(history[0].tree.get("data.csv").unwrap(), b"a,b\n1,2");
}

#[tokio::test]
async fn test_duplicate_submissions_are_serialized() {
    let h = Harness::new();
    let coordinator = Arc::new(h.coordinator());

    let runs: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.run(&task(1, "a hello-world page")).await })
        })
        .collect();

    let mut branches = Vec::new();
    for run in runs {
        let outcome = run.await.unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.error());
        branches.push(outcome.repo_branch.unwrap());
    }
    branches.sort_by_key(|b| b.to_string());

    assert_eq!(branches, vec![RepoBranch::Cloned, RepoBranch::Created]);
    assert_eq!(h.remotes.history(&h.remote()).len(), 1);
}
