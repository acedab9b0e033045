use std::collections::HashMap;

use anyhow::Result;

use courier_db::Database;

use crate::tasks::{CreateScheduleMessage, SendEventMessage};

/// A callback the beat worker can fire by name.
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, db: &Database, kwargs: &serde_json::Value) -> Result<()>;
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<&'static str, Box<dyn Task>>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every task the chat endpoints schedule.
    pub fn with_chat_tasks() -> Self {
        let mut registry = Self::new();
        registry.register(SendEventMessage);
        registry.register(CreateScheduleMessage);
        registry
    }

    pub fn register<T: Task + 'static>(&mut self, task: T) {
        self.tasks.insert(task.name(), Box::new(task));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Task> {
        self.tasks.get(name).map(|task| task.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tasks.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
