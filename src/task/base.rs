// src/task/base.rs
//! Task base state and task snapshots

use crate::reference::Reference;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque caller payload attached to a task
pub type UserData = Arc<dyn Any + Send + Sync>;

/// State shared by every task type
///
/// Embedded in concrete task structs and exposed through [`Task::base`].
#[derive(Default, Clone)]
pub struct TaskBase {
    serial_id: u64,
    tag: Option<String>,
    priority: i32,
    user_data: Option<UserData>,
    done: bool,
}

impl TaskBase {
    /// Set the scheduling fields in one call
    pub fn initialize(&mut self, tag: Option<String>, priority: i32, user_data: Option<UserData>) {
        self.tag = tag;
        self.priority = priority;
        self.user_data = user_data;
        self.done = false;
    }

    /// Serial id assigned by the task pool, 0 until queued
    pub fn serial_id(&self) -> u64 {
        self.serial_id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    /// Higher values are dispatched first
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub fn set_user_data(&mut self, user_data: UserData) {
        self.user_data = Some(user_data);
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Mark the task finished; the pool reclaims it on its next update
    pub fn set_done(&mut self, done: bool) {
        self.done = done;
    }

    pub(crate) fn assign_serial_id(&mut self, serial_id: u64) {
        self.serial_id = serial_id;
    }

    /// Reset to the neutral state
    pub fn clear(&mut self) {
        self.serial_id = 0;
        self.tag = None;
        self.priority = 0;
        self.user_data = None;
        self.done = false;
    }
}

impl fmt::Debug for TaskBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBase")
            .field("serial_id", &self.serial_id)
            .field("tag", &self.tag)
            .field("priority", &self.priority)
            .field("has_user_data", &self.user_data.is_some())
            .field("done", &self.done)
            .finish()
    }
}

/// A schedulable, poolable unit of work
///
/// Implementors embed a [`TaskBase`] and must clear it from
/// [`Reference::clear`].
pub trait Task: Reference {
    fn base(&self) -> &TaskBase;

    fn base_mut(&mut self) -> &mut TaskBase;

    /// Human readable description for task listings
    fn description(&self) -> Option<String> {
        None
    }
}

/// Where a task sits in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a free agent
    Todo,
    /// Assigned to an agent
    Doing,
}

/// Snapshot of a queued or running task
#[derive(Clone)]
pub struct TaskInfo {
    pub serial_id: u64,
    pub tag: Option<String>,
    pub priority: i32,
    pub user_data: Option<UserData>,
    pub status: TaskStatus,
    pub description: Option<String>,
}

impl TaskInfo {
    pub(crate) fn capture<T: Task>(task: &T, status: TaskStatus) -> Self {
        let base = task.base();
        Self {
            serial_id: base.serial_id,
            tag: base.tag.clone(),
            priority: base.priority,
            user_data: base.user_data.clone(),
            status,
            description: task.description(),
        }
    }
}

impl fmt::Debug for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInfo")
            .field("serial_id", &self.serial_id)
            .field("tag", &self.tag)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_resets_every_field() {
        let mut base = TaskBase::default();
        base.initialize(Some("download".into()), 5, Some(Arc::new(42u32)));
        base.assign_serial_id(9);
        base.set_done(true);

        base.clear();

        assert_eq!(base.serial_id(), 0);
        assert_eq!(base.tag(), None);
        assert_eq!(base.priority(), 0);
        assert!(base.user_data().is_none());
        assert!(!base.is_done());
    }

    #[test]
    fn test_user_data_downcast() {
        let mut base = TaskBase::default();
        base.set_user_data(Arc::new(String::from("payload")));
        let data = base.user_data().unwrap();
        assert_eq!(data.downcast_ref::<String>().unwrap(), "payload");
    }
}
