//! Task model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task status on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

/// A task on the board
///
/// A task belongs to exactly one organization, fixed at creation. The creator
/// is nullable: the creating user record may have been removed since.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Assigned by the repository on create
    pub id: u64,
    pub org_id: u64,
    pub creator_id: Option<u64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub category: String,
    /// Ordering within the organization's board
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task draft for the given organization
    pub fn new(org_id: u64, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            org_id,
            creator_id: None,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            category: "General".to_string(),
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Record the creating user
    pub fn with_creator(mut self, creator_id: u64) -> Self {
        self.creator_id = Some(creator_id);
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}
