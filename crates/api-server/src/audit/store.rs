use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::warn;

use super::{AuditEvent, AuditListQuery};

/// Append-only audit log, one JSON event per line
pub struct AuditStore {
    events_path: PathBuf,
    events: RwLock<Vec<AuditEvent>>,
}

fn matches_action_filter(action: &str, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    action.to_lowercase().contains(filter)
}

impl AuditStore {
    pub async fn new(root_dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&root_dir).await?;
        let events_path = root_dir.join("events.jsonl");

        if fs::metadata(&events_path).await.is_err() {
            fs::File::create(&events_path).await?;
        }

        let events = Self::load_events(&events_path).await?;
        Ok(Self {
            events_path,
            events: RwLock::new(events),
        })
    }

    async fn load_events(path: &Path) -> std::io::Result<Vec<AuditEvent>> {
        let file = fs::File::open(path).await?;
        let mut reader = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<AuditEvent>(&line) {
                Ok(event) => events.push(event),
                Err(err) => warn!(
                    "Ignoring malformed audit event in {}: {}",
                    path.display(),
                    err
                ),
            }
        }

        Ok(events)
    }

    pub async fn append(&self, event: AuditEvent) -> Result<(), String> {
        let encoded = serde_json::to_string(&event)
            .map_err(|err| format!("Failed to encode audit event: {}", err))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .map_err(|err| format!("Failed to open audit log: {}", err))?;

        file.write_all(encoded.as_bytes())
            .await
            .map_err(|err| format!("Failed to write audit log: {}", err))?;
        file.write_all(b"\n")
            .await
            .map_err(|err| format!("Failed to finalize audit log line: {}", err))?;
        file.flush()
            .await
            .map_err(|err| format!("Failed to flush audit log: {}", err))?;

        let mut state = self.events.write().await;
        state.push(event);
        Ok(())
    }

    /// Events for `org_id`, latest first, with offset/limit pagination.
    pub async fn list_paginated(
        &self,
        org_id: u64,
        query: &AuditListQuery,
    ) -> (Vec<AuditEvent>, bool) {
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);
        let action_filter = query
            .action
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase);

        let state = self.events.read().await;
        let mut matched = 0usize;
        let mut events = Vec::with_capacity(limit);

        for event in state.iter().rev() {
            if event.org_id != org_id {
                continue;
            }

            if !matches_action_filter(&event.action, action_filter.as_deref()) {
                continue;
            }

            if let Some(task_id) = query.task_id {
                if event.task_id != Some(task_id) {
                    continue;
                }
            }

            if matched < offset {
                matched += 1;
                continue;
            }

            if events.len() < limit {
                events.push(event.clone());
            }
            matched += 1;
        }

        let has_more = matched > offset + events.len();
        (events, has_more)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn append_and_list_returns_latest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = AuditStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        let first = AuditEvent::new(1, Some(10), "task.created", Some(7), serde_json::Value::Null);
        let second = AuditEvent::new(1, Some(10), "task.deleted", Some(7), serde_json::Value::Null);

        store.append(first.clone()).await.unwrap();
        store.append(second.clone()).await.unwrap();

        let (events, has_more) = store.list_paginated(1, &AuditListQuery::default()).await;
        assert!(!has_more);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, second.action);
        assert_eq!(events[1].action, first.action);
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_organization() {
        let temp_dir = TempDir::new().unwrap();
        let store = AuditStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        store
            .append(AuditEvent::new(1, None, "task.created", None, serde_json::Value::Null))
            .await
            .unwrap();
        store
            .append(AuditEvent::new(2, None, "task.created", None, serde_json::Value::Null))
            .await
            .unwrap();

        let (events, _) = store.list_paginated(2, &AuditListQuery::default()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].org_id, 2);
    }

    #[tokio::test]
    async fn action_and_task_filters_apply() {
        let temp_dir = TempDir::new().unwrap();
        let store = AuditStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        store
            .append(AuditEvent::new(1, None, "task.created", Some(7), serde_json::Value::Null))
            .await
            .unwrap();
        store
            .append(AuditEvent::new(1, None, "task.updated", Some(8), serde_json::Value::Null))
            .await
            .unwrap();

        let query = AuditListQuery {
            action: Some("created".to_string()),
            ..Default::default()
        };
        let (events, _) = store.list_paginated(1, &query).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].task_id, Some(7));

        let query = AuditListQuery {
            task_id: Some(8),
            ..Default::default()
        };
        let (events, _) = store.list_paginated(1, &query).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "task.updated");
    }
}
