//! File-based task storage implementation
//!
//! Stores tasks as JSON in a file on disk.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::model::Task;
use super::repository::TaskRepository;
use crate::rbac::{TaskDirectory, TaskRef};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct TaskCache {
    tasks: HashMap<u64, Task>,
    next_id: u64,
}

/// File-based task store using JSON
pub struct FileTaskStore {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory cache of tasks
    cache: RwLock<TaskCache>,
}

impl FileTaskStore {
    /// Create a new FileTaskStore
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let tasks: Vec<Task> = serde_json::from_str(&content)?;
            let next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            TaskCache {
                tasks: tasks.into_iter().map(|t| (t.id, t)).collect(),
                next_id,
            }
        } else {
            TaskCache {
                tasks: HashMap::new(),
                next_id: 1,
            }
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Persist the cache to disk
    async fn persist(&self) -> Result<()> {
        let cache = self.cache.read().await;
        let mut tasks: Vec<&Task> = cache.tasks.values().collect();
        tasks.sort_by_key(|t| t.id);
        let content = serde_json::to_string_pretty(&tasks)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for FileTaskStore {
    async fn create(&self, mut task: Task) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(Error::InvalidInput("Title cannot be empty".to_string()));
        }
        {
            let mut cache = self.cache.write().await;
            task.id = cache.next_id;
            cache.next_id += 1;
            if task.position == 0 {
                let in_org = cache
                    .tasks
                    .values()
                    .filter(|t| t.org_id == task.org_id)
                    .count();
                task.position = in_org as u32 + 1;
            }
            cache.tasks.insert(task.id, task.clone());
        }
        self.persist().await?;
        Ok(task)
    }

    async fn get(&self, id: u64) -> Result<Option<Task>> {
        let cache = self.cache.read().await;
        Ok(cache.tasks.get(&id).cloned())
    }

    async fn list_by_org(&self, org_id: u64) -> Result<Vec<Task>> {
        let cache = self.cache.read().await;
        let mut tasks: Vec<Task> = cache
            .tasks
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.position.cmp(&b.position).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn update(&self, mut task: Task) -> Result<Task> {
        task.updated_at = Utc::now();
        {
            let mut cache = self.cache.write().await;
            let Some(existing) = cache.tasks.get(&task.id) else {
                return Err(Error::TaskNotFound(task.id));
            };
            // The owning organization is fixed at creation.
            task.org_id = existing.org_id;
            task.creator_id = existing.creator_id;
            cache.tasks.insert(task.id, task.clone());
        }
        self.persist().await?;
        Ok(task)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let removed = {
            let mut cache = self.cache.write().await;
            cache.tasks.remove(&id).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl TaskDirectory for FileTaskStore {
    async fn find_task_ref(&self, id: u64) -> Result<Option<TaskRef>> {
        let cache = self.cache.read().await;
        Ok(cache.tasks.get(&id).map(|task| TaskRef {
            id: task.id,
            org_id: task.org_id,
            creator_id: task.creator_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn build_store() -> (FileTaskStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(temp_dir.path().join("tasks.json"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn create_assigns_id_and_position_per_org() {
        let (store, _temp_dir) = build_store().await;
        let first = store.create(Task::new(1, "First")).await.unwrap();
        let second = store.create(Task::new(1, "Second")).await.unwrap();
        let other_org = store.create(Task::new(2, "Other")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(other_org.position, 1);
    }

    #[tokio::test]
    async fn create_rejects_empty_title() {
        let (store, _temp_dir) = build_store().await;
        let err = store.create(Task::new(1, "   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn list_by_org_returns_board_order() {
        let (store, _temp_dir) = build_store().await;
        store.create(Task::new(1, "First")).await.unwrap();
        store.create(Task::new(1, "Second")).await.unwrap();
        store.create(Task::new(2, "Elsewhere")).await.unwrap();

        let tasks = store.list_by_org(1).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "First");
        assert_eq!(tasks[1].title, "Second");
    }

    #[tokio::test]
    async fn update_keeps_org_and_creator_fixed() {
        let (store, _temp_dir) = build_store().await;
        let created = store
            .create(Task::new(1, "Task").with_creator(100))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.title = "Renamed".to_string();
        changed.org_id = 2;
        changed.creator_id = Some(999);
        let updated = store.update(changed).await.unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.org_id, 1);
        assert_eq!(updated.creator_id, Some(100));
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_missing_task_fails() {
        let (store, _temp_dir) = build_store().await;
        let mut task = Task::new(1, "Ghost");
        task.id = 42;
        let err = store.update(task).await.unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(42)));
    }

    #[tokio::test]
    async fn delete_returns_whether_removed() {
        let (store, _temp_dir) = build_store().await;
        let task = store.create(Task::new(1, "Task")).await.unwrap();
        assert!(store.delete(task.id).await.unwrap());
        assert!(!store.delete(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn tasks_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");
        let task_id = {
            let store = FileTaskStore::new(&path).await.unwrap();
            store
                .create(Task::new(1, "Persisted").with_creator(100))
                .await
                .unwrap()
                .id
        };

        let reopened = FileTaskStore::new(&path).await.unwrap();
        let task_ref = reopened.find_task_ref(task_id).await.unwrap().unwrap();
        assert_eq!(task_ref.org_id, 1);
        assert_eq!(task_ref.creator_id, Some(100));
        let next = reopened.create(Task::new(1, "Next")).await.unwrap();
        assert_eq!(next.id, task_id + 1);
    }
}
