use core::fmt;
use tokio::task;

/// Describes the execution unit that is currently running a call.
///
/// Inside a Tokio task this is the task's runtime-unique [`task::Id`] plus the
/// name of the worker thread that happened to poll it. The thread part is
/// informational only: a task may migrate between worker threads across
/// suspension points, while its id stays fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorTag {
    task: Option<task::Id>,
    thread: String,
}

impl ExecutorTag {
    /// Captures the tag of the caller.
    pub fn current() -> Self {
        let thread = std::thread::current();
        Self {
            task: task::try_id(),
            thread: thread.name().unwrap_or("unnamed").to_string(),
        }
    }

    /// Id of the task, or `None` when captured outside of a task.
    pub const fn task_id(&self) -> Option<task::Id> {
        self.task
    }
}

impl fmt::Display for ExecutorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.task {
            Some(id) => write!(f, "Task[id={}, thread={}]", id, self.thread),
            None => write!(f, "Thread[name={}]", self.thread),
        }
    }
}
