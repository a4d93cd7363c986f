//! Outcome of each best-effort step of a teardown.

use std::fmt;

/// A step of `down`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CleanupTask {
    /// Looking up the operator endpoint before anything is deleted.
    Discovery,
    /// Deleting the state bucket.
    Bucket,
    /// Deleting the cluster.
    Cluster,
    /// Removing environments that pointed at the cluster.
    Registry,
    /// Removing the cached access coordinates.
    Cache,
}

impl fmt::Display for CleanupTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovery => "operator endpoint lookup",
            Self::Bucket => "state bucket deletion",
            Self::Cluster => "cluster deletion",
            Self::Registry => "environment cleanup",
            Self::Cache => "cached configuration cleanup",
        })
    }
}

/// How a step ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskStatus {
    /// The step succeeded.
    Done,
    /// The step was not attempted.
    Skipped(String),
    /// The step failed; the command carried on.
    Failed(String),
}

/// One recorded step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskResult {
    /// Step.
    pub task: CleanupTask,
    /// Outcome.
    pub status: TaskStatus,
}

/// Results of every teardown step, in the order they ran.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CleanupReport {
    results: Vec<TaskResult>,
}

impl CleanupReport {
    /// Records the outcome of `task`.
    pub fn record(&mut self, task: CleanupTask, status: TaskStatus) {
        self.results.push(TaskResult { task, status });
    }

    /// Outcome of `task`, when it was recorded.
    #[must_use]
    pub fn status(&self, task: CleanupTask) -> Option<&TaskStatus> {
        self.results
            .iter()
            .find(|result| result.task == task)
            .map(|result| &result.status)
    }

    /// Every recorded result.
    #[must_use]
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    /// Steps that failed.
    #[must_use]
    pub fn failed(&self) -> Vec<CleanupTask> {
        self.results
            .iter()
            .filter(|result| matches!(result.status, TaskStatus::Failed(_)))
            .map(|result| result.task)
            .collect()
    }

    /// Returns `true` when no step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed().is_empty()
    }

    /// Returns `true` when every recorded step is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.results
            .iter()
            .all(|result| result.status == TaskStatus::Done)
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            match &result.status {
                TaskStatus::Done => writeln!(f, "{}: done", result.task)?,
                TaskStatus::Skipped(reason) => writeln!(f, "{}: skipped ({reason})", result.task)?,
                TaskStatus::Failed(reason) => writeln!(f, "{}: failed ({reason})", result.task)?,
            }
        }
        Ok(())
    }
}
