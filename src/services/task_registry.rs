use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use crate::models::Task;

/// Process-wide map of directory-upload tasks.
///
/// One lock guards every task. Each read-modify-write holds it for the whole
/// mutation and readers get cloned snapshots, so a reader never observes a
/// half-applied update. Entries are never removed.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, task: Task) {
        let mut tasks = self.tasks.lock().await;
        tracing::debug!("Registering task {}", task.task_id);
        tasks.insert(task.task_id.clone(), task);
    }

    pub async fn read(&self, task_id: &str) -> Option<Task> {
        self.tasks.lock().await.get(task_id).cloned()
    }

    pub async fn read_all(&self) -> HashMap<String, Task> {
        self.tasks.lock().await.clone()
    }

    /// Applies `f` under the lock. Returns `None` if the task is unknown.
    pub async fn mutate<R>(&self, task_id: &str, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        let mut tasks = self.tasks.lock().await;
        tasks.get_mut(task_id).map(f)
    }
}
