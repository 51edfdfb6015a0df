// src/task/agent.rs
//! Task agent contract

use crate::task::base::Task;
use std::time::Duration;

/// Outcome of handing a task to an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTaskStatus {
    /// Finished inside `start`; agent freed, task released
    Done,
    /// Started and keeps running; agent stays busy until the task is done
    CanResume,
    /// Cannot start now; agent freed, task stays queued, dispatch stops this tick
    HasToWait,
    /// Failed; agent freed, task released, the pool keeps running
    UnknownError,
}

/// A long-lived worker executing at most one task at a time
///
/// The pool owns both the agent and the task it is working on; the task is
/// lent to the agent on every call instead of being stored in it.
pub trait TaskAgent<T: Task>: Send {
    /// Called once when the agent joins a pool
    fn initialize(&mut self) {}

    /// Try to begin `task`
    fn start(&mut self, task: &mut T) -> StartTaskStatus;

    /// Advance the running task; mark it done through `task.base_mut().set_done(true)`
    fn update(&mut self, task: &mut T, elapsed: Duration, real_elapsed: Duration);

    /// Drop any per-task state so the agent can take another task
    ///
    /// Also the cancellation hook when a running task is removed.
    fn reset(&mut self) {}

    /// Called once when the pool shuts down
    fn shutdown(&mut self) {}
}
