//! Hand-off from the request handler to background workflow runs

use pagesmith_core::Task;
use pagesmith_orchestrator::Coordinator;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Schedules an accepted task; must return without waiting for the run
pub trait TaskDispatcher: Send + Sync + std::fmt::Debug {
    fn dispatch(&self, task: Task);
}

/// Spawns one tokio task per accepted submission
///
/// Handles are dropped: nothing joins, cancels or times out a run. A run
/// ends in a terminal state or with the process.
#[derive(Debug, Clone)]
pub struct SpawnDispatcher {
    coordinator: Arc<Coordinator>,
}

impl SpawnDispatcher {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

impl TaskDispatcher for SpawnDispatcher {
    fn dispatch(&self, task: Task) {
        info!(task = %task.id, round = task.round, "Scheduling workflow");
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            coordinator.run(&task).await;
        });
    }
}

/// Dispatcher that only records what it was given
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    tasks: Mutex<Vec<Task>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<Task> {
        match self.tasks.lock() {
            Ok(tasks) => tasks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TaskDispatcher for RecordingDispatcher {
    fn dispatch(&self, task: Task) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(task),
            Err(poisoned) => poisoned.into_inner().push(task),
        }
    }
}
