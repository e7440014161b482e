//! Client-side view of the task list.
//!
//! The cache is filled by whatever fetch path the surrounding app uses
//! (the backend's authenticated REST read or its realtime feed) and is
//! invalidated when the relay reports that a chat turn mutated the board.

use flowboard::tasks::Task;

#[derive(Debug, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
    stale: bool,
}

impl TaskCache {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            stale: true,
        }
    }

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.stale = false;
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Plain-text summary spliced into the relay's system instructions so
    /// the model can match tasks by title. Empty when the board is empty.
    pub fn summary(&self) -> String {
        if self.tasks.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = self
            .tasks
            .iter()
            .map(|t| {
                let due = t
                    .due_date
                    .map(|d| format!(", due: {d}"))
                    .unwrap_or_default();
                format!(
                    "- [{}] \"{}\" (priority: {}{})",
                    t.status, t.title, t.priority, due
                )
            })
            .collect();
        format!("\n\nUser's current tasks:\n{}", lines.join("\n"))
    }
}
