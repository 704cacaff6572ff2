use chrono::{DateTime, Utc};
use semtable_common::{Result, SemtableError};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Regeneration task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

/// Regeneration task info
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub store: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
}

/// Tracks regeneration tasks, keyed by store name.
///
/// Doubles as the per-store exclusive write lock: `begin` refuses to start a
/// task for a store that already has one running, and the slot is released
/// by `complete` or `fail`. Finished tasks stay visible until the next
/// `begin` for the same store.
pub struct RegenerationTracker {
    tasks: RwLock<HashMap<String, TaskInfo>>,
}

impl RegenerationTracker {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Claim the store for a new task; fails while one is already running
    pub async fn begin(&self, store: &str) -> Result<String> {
        let mut tasks = self.tasks.write().await;
        if let Some(existing) = tasks.get(store) {
            if existing.status == TaskStatus::Running {
                return Err(SemtableError::invariant(format!(
                    "a regeneration is already in flight for store '{}'",
                    store
                )));
            }
        }

        let task_id = Uuid::new_v4().to_string();
        tasks.insert(
            store.to_string(),
            TaskInfo {
                task_id: task_id.clone(),
                store: store.to_string(),
                status: TaskStatus::Running,
                progress: 0,
                message: "Starting...".to_string(),
                started_at: Utc::now(),
            },
        );
        Ok(task_id)
    }

    pub async fn update_progress(&self, store: &str, progress: u8, message: String) {
        if let Some(task) = self.tasks.write().await.get_mut(store) {
            task.progress = progress;
            task.message = message;
        }
    }

    pub async fn complete(&self, store: &str) {
        if let Some(task) = self.tasks.write().await.get_mut(store) {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.message = "Completed".to_string();
        }
    }

    pub async fn fail(&self, store: &str, error: String) {
        if let Some(task) = self.tasks.write().await.get_mut(store) {
            task.status = TaskStatus::Failed;
            task.message = error;
        }
    }

    pub async fn in_flight(&self, store: &str) -> bool {
        self.tasks
            .read()
            .await
            .get(store)
            .map(|t| t.status == TaskStatus::Running)
            .unwrap_or(false)
    }

    pub async fn tasks(&self) -> Vec<TaskInfo> {
        self.tasks.read().await.values().cloned().collect()
    }
}

impl Default for RegenerationTracker {
    fn default() -> Self {
        Self::new()
    }
}
