//! # Child set of an event loop.
//!
//! Owns the handles of a loop's direct children. Entry `i` is paired with
//! multiplexer source `i + 1` (source 0 is the control channel); both lists are
//! appended and removed in lockstep by the loop.

use crate::tasks::{TaskHandle, TaskId};

#[derive(Default)]
pub(crate) struct ChildSet {
    children: Vec<TaskHandle>,
}

impl ChildSet {
    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn push(&mut self, handle: TaskHandle) {
        self.children.push(handle);
    }

    /// Removes the child paired with multiplexer source `source_index`.
    pub(crate) fn remove_for_source(&mut self, source_index: usize) -> TaskHandle {
        self.children.remove(source_index - 1)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TaskHandle> {
        self.children.iter()
    }

    pub(crate) fn ids(&self) -> Vec<TaskId> {
        self.children.iter().map(TaskHandle::id).collect()
    }
}
