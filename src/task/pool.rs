// src/task/pool.rs
//! Priority-ordered task scheduling onto a bounded set of agents
//!
//! # Architecture
//!
//! ```text
//! TaskPool
//! ├─ Free agents:    [A1, A2, ...]           (stack, idle)
//! ├─ Working agents: [(A3, task), ...]       (each owns one task)
//! └─ Waiting tasks:  [p=5, p=5, p=3, p=1]    (descending priority, FIFO ties)
//! ```
//!
//! Each [`TaskPool::update`] first advances running tasks (reclaiming the
//! finished ones), then hands waiting tasks to free agents from the front of
//! the queue. A task whose agent answers [`StartTaskStatus::HasToWait`] blocks
//! the queue until the next tick.
//!
//! The pool is driven from a single update thread; every mutating call takes
//! `&mut self`.

use crate::reference::{ReferenceHandle, ReferencePool};
use crate::task::agent::{StartTaskStatus, TaskAgent};
use crate::task::base::{Task, TaskInfo, TaskStatus};
use crate::utils::errors::Result;
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Serial ids are unique across every task pool in the process
static NEXT_SERIAL_ID: AtomicU64 = AtomicU64::new(1);

struct WaitingTask<T> {
    handle: ReferenceHandle<T>,
    task: T,
}

struct WorkingAgent<T: Task> {
    agent: Box<dyn TaskAgent<T>>,
    handle: ReferenceHandle<T>,
    task: T,
}

/// Task pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPoolStats {
    pub total_agents: usize,
    pub free_agents: usize,
    pub working_agents: usize,
    pub waiting_tasks: usize,
}

/// Scheduler matching pooled tasks of type `T` to agents
pub struct TaskPool<T: Task> {
    references: Arc<ReferencePool>,
    free_agents: Vec<Box<dyn TaskAgent<T>>>,
    working_agents: Vec<WorkingAgent<T>>,
    waiting_tasks: VecDeque<WaitingTask<T>>,
    paused: bool,
}

impl<T: Task> TaskPool<T> {
    /// Create an empty pool recycling its tasks through `references`
    pub fn new(references: Arc<ReferencePool>) -> Self {
        debug!("Creating task pool for {}", std::any::type_name::<T>());
        Self {
            references,
            free_agents: Vec::new(),
            working_agents: Vec::new(),
            waiting_tasks: VecDeque::new(),
            paused: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop advancing tasks; queued work is kept
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn total_agent_count(&self) -> usize {
        self.free_agents.len() + self.working_agents.len()
    }

    pub fn free_agent_count(&self) -> usize {
        self.free_agents.len()
    }

    pub fn working_agent_count(&self) -> usize {
        self.working_agents.len()
    }

    pub fn waiting_task_count(&self) -> usize {
        self.waiting_tasks.len()
    }

    pub fn stats(&self) -> TaskPoolStats {
        TaskPoolStats {
            total_agents: self.total_agent_count(),
            free_agents: self.free_agent_count(),
            working_agents: self.working_agent_count(),
            waiting_tasks: self.waiting_task_count(),
        }
    }

    /// Register an agent; it is initialized and becomes free immediately
    pub fn add_agent<A>(&mut self, mut agent: A)
    where
        A: TaskAgent<T> + 'static,
    {
        agent.initialize();
        self.free_agents.push(Box::new(agent));
        debug!("Task agent added ({} total)", self.total_agent_count());
    }

    /// Queue an acquired task and return its serial id
    ///
    /// The task is checked out of the reference pool until it is finished or
    /// removed, then released exactly once.
    pub fn add_task(&mut self, handle: ReferenceHandle<T>) -> Result<u64> {
        let mut task = self.references.take(handle)?;

        let serial_id = NEXT_SERIAL_ID.fetch_add(1, Ordering::Relaxed);
        task.base_mut().assign_serial_id(serial_id);
        task.base_mut().set_done(false);

        // After the last task with priority >= ours, so equal priorities stay FIFO
        let priority = task.base().priority();
        let position = self
            .waiting_tasks
            .iter()
            .rposition(|waiting| waiting.task.base().priority() >= priority)
            .map_or(0, |index| index + 1);
        self.waiting_tasks
            .insert(position, WaitingTask { handle, task });

        trace!(
            "Task {} queued at {} with priority {}",
            serial_id,
            position,
            priority
        );
        counter!("zero_kernel_tasks_added_total").increment(1);
        Ok(serial_id)
    }

    /// Advance the pool by one tick
    pub fn update(&mut self, elapsed: Duration, real_elapsed: Duration) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        self.process_running_tasks(elapsed, real_elapsed)?;
        self.process_waiting_tasks()?;

        gauge!("zero_kernel_tasks_waiting").set(self.waiting_tasks.len() as f64);
        gauge!("zero_kernel_agents_working").set(self.working_agents.len() as f64);
        Ok(())
    }

    fn process_running_tasks(&mut self, elapsed: Duration, real_elapsed: Duration) -> Result<()> {
        let mut index = 0;
        while index < self.working_agents.len() {
            let working = &mut self.working_agents[index];
            if !working.task.base().is_done() {
                working.agent.update(&mut working.task, elapsed, real_elapsed);
                index += 1;
                continue;
            }

            let WorkingAgent {
                mut agent,
                handle,
                task,
            } = self.working_agents.remove(index);
            trace!("Task {} done", task.base().serial_id());
            agent.reset();
            self.free_agents.push(agent);
            self.references.release_value(handle, task)?;
            counter!("zero_kernel_tasks_completed_total").increment(1);
        }
        Ok(())
    }

    fn process_waiting_tasks(&mut self) -> Result<()> {
        // Always dispatch from the front: a started task leaves the queue, a
        // blocked one stops the pass
        while let Some(front) = self.waiting_tasks.front_mut() {
            let Some(mut agent) = self.free_agents.pop() else {
                break;
            };

            let status = agent.start(&mut front.task);
            if status == StartTaskStatus::HasToWait {
                trace!(
                    "Task {} has to wait, dispatch blocked this tick",
                    front.task.base().serial_id()
                );
                agent.reset();
                self.free_agents.push(agent);
                break;
            }

            let Some(WaitingTask { handle, task }) = self.waiting_tasks.pop_front() else {
                break;
            };

            match status {
                StartTaskStatus::CanResume => {
                    trace!("Task {} started", task.base().serial_id());
                    self.working_agents.push(WorkingAgent {
                        agent,
                        handle,
                        task,
                    });
                }
                StartTaskStatus::UnknownError => {
                    warn!(
                        "Task {} failed to start, discarding it",
                        task.base().serial_id()
                    );
                    agent.reset();
                    self.free_agents.push(agent);
                    self.references.release_value(handle, task)?;
                    counter!("zero_kernel_tasks_failed_total").increment(1);
                }
                // Done; HasToWait never reaches this match
                _ => {
                    agent.reset();
                    self.free_agents.push(agent);
                    self.references.release_value(handle, task)?;
                    counter!("zero_kernel_tasks_completed_total").increment(1);
                }
            }
        }
        Ok(())
    }

    /// Snapshot of one task, running tasks first
    pub fn task_info(&self, serial_id: u64) -> Option<TaskInfo> {
        self.working_agents
            .iter()
            .find(|working| working.task.base().serial_id() == serial_id)
            .map(|working| TaskInfo::capture(&working.task, TaskStatus::Doing))
            .or_else(|| {
                self.waiting_tasks
                    .iter()
                    .find(|waiting| waiting.task.base().serial_id() == serial_id)
                    .map(|waiting| TaskInfo::capture(&waiting.task, TaskStatus::Todo))
            })
    }

    /// Snapshots of all tasks carrying `tag`
    pub fn task_infos(&self, tag: &str) -> Vec<TaskInfo> {
        self.all_task_infos()
            .into_iter()
            .filter(|info| info.tag.as_deref() == Some(tag))
            .collect()
    }

    /// Snapshots of every running then waiting task
    pub fn all_task_infos(&self) -> Vec<TaskInfo> {
        let running = self
            .working_agents
            .iter()
            .map(|working| TaskInfo::capture(&working.task, TaskStatus::Doing));
        let waiting = self
            .waiting_tasks
            .iter()
            .map(|waiting| TaskInfo::capture(&waiting.task, TaskStatus::Todo));
        running.chain(waiting).collect()
    }

    /// Cancel one task; returns whether it was found
    pub fn remove_task(&mut self, serial_id: u64) -> Result<bool> {
        let removed = self.remove_where(|task| task.base().serial_id() == serial_id)?;
        Ok(removed > 0)
    }

    /// Cancel every task carrying `tag`
    pub fn remove_tasks(&mut self, tag: &str) -> Result<usize> {
        self.remove_where(|task| task.base().tag() == Some(tag))
    }

    /// Cancel every task
    pub fn remove_all_tasks(&mut self) -> Result<usize> {
        self.remove_where(|_| true)
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Result<usize> {
        let mut removed = 0;

        let mut index = 0;
        while index < self.waiting_tasks.len() {
            if !predicate(&self.waiting_tasks[index].task) {
                index += 1;
                continue;
            }
            if let Some(WaitingTask { handle, task }) = self.waiting_tasks.remove(index) {
                self.references.release_value(handle, task)?;
                removed += 1;
            }
        }

        let mut index = 0;
        while index < self.working_agents.len() {
            if !predicate(&self.working_agents[index].task) {
                index += 1;
                continue;
            }
            let WorkingAgent {
                mut agent,
                handle,
                task,
            } = self.working_agents.remove(index);
            agent.reset();
            self.free_agents.push(agent);
            self.references.release_value(handle, task)?;
            removed += 1;
        }

        if removed > 0 {
            debug!("Removed {} tasks", removed);
            counter!("zero_kernel_tasks_removed_total").increment(removed as u64);
        }
        Ok(removed)
    }

    /// Cancel all tasks and shut every agent down
    pub fn shutdown(&mut self) -> Result<()> {
        let removed = self.remove_all_tasks()?;
        for mut agent in self.free_agents.drain(..) {
            agent.shutdown();
        }
        info!(
            "Task pool for {} shut down ({} tasks cancelled)",
            std::any::type_name::<T>(),
            removed
        );
        Ok(())
    }
}
