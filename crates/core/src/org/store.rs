//! File-based organization and membership storage
//!
//! Organizations and memberships live in a single JSON state file with an
//! in-memory cache. Writes go through the cache and are persisted as a whole.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::model::{Membership, Organization};
use crate::rbac::{MembershipDirectory, MembershipRef, OrgRef, OrganizationDirectory, Role};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct OrgState {
    organizations: HashMap<u64, Organization>,
    memberships: HashMap<u64, Membership>,
    next_org_id: u64,
    next_membership_id: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredOrgState {
    organizations: Vec<Organization>,
    memberships: Vec<Membership>,
}

impl From<StoredOrgState> for OrgState {
    fn from(value: StoredOrgState) -> Self {
        let next_org_id = value
            .organizations
            .iter()
            .map(|org| org.id)
            .max()
            .unwrap_or(0)
            + 1;
        let next_membership_id = value
            .memberships
            .iter()
            .map(|membership| membership.id)
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            organizations: value
                .organizations
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
            memberships: value
                .memberships
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
            next_org_id,
            next_membership_id,
        }
    }
}

impl From<&OrgState> for StoredOrgState {
    fn from(value: &OrgState) -> Self {
        let mut organizations: Vec<Organization> = value.organizations.values().cloned().collect();
        organizations.sort_by_key(|org| org.id);
        let mut memberships: Vec<Membership> = value.memberships.values().cloned().collect();
        memberships.sort_by_key(|membership| membership.id);
        Self {
            organizations,
            memberships,
        }
    }
}

/// File-backed store for organizations and memberships
pub struct FileOrgStore {
    state: RwLock<OrgState>,
    path: PathBuf,
}

impl FileOrgStore {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = load_state(&path).await?;
        Ok(Self {
            state: RwLock::new(state),
            path,
        })
    }

    /// Create an organization, optionally nested under an existing parent.
    pub async fn create_org(&self, name: &str, parent_id: Option<u64>) -> Result<Organization> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Organization name cannot be empty".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if let Some(parent_id) = parent_id {
            if !state.organizations.contains_key(&parent_id) {
                return Err(Error::OrganizationNotFound(parent_id));
            }
        }

        let org = Organization {
            id: state.next_org_id,
            name: name.to_string(),
            parent_id,
            created_at: Utc::now(),
        };
        state.next_org_id += 1;
        state.organizations.insert(org.id, org.clone());
        self.persist(&state).await?;
        Ok(org)
    }

    /// Create or update the membership for `(user_id, org_id)`.
    ///
    /// An existing membership keeps its id; only the role changes.
    pub async fn upsert_member(&self, user_id: u64, org_id: u64, role: Role) -> Result<Membership> {
        let mut state = self.state.write().await;
        if !state.organizations.contains_key(&org_id) {
            return Err(Error::OrganizationNotFound(org_id));
        }

        let existing = state
            .memberships
            .values_mut()
            .find(|membership| membership.user_id == user_id && membership.org_id == org_id);
        let membership = if let Some(existing) = existing {
            existing.role = role;
            existing.clone()
        } else {
            let membership = Membership {
                id: state.next_membership_id,
                user_id,
                org_id,
                role,
                created_at: Utc::now(),
            };
            state.next_membership_id += 1;
            state.memberships.insert(membership.id, membership.clone());
            membership
        };
        self.persist(&state).await?;
        Ok(membership)
    }

    pub async fn get_org(&self, id: u64) -> Result<Option<Organization>> {
        let state = self.state.read().await;
        Ok(state.organizations.get(&id).cloned())
    }

    /// The caller's membership in exactly `org_id`, if any. Used for
    /// administrative role checks outside the policy evaluator.
    pub async fn membership_for(&self, user_id: u64, org_id: u64) -> Result<Option<Membership>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .values()
            .find(|membership| membership.user_id == user_id && membership.org_id == org_id)
            .cloned())
    }

    /// Organizations the user belongs to, with their role, ordered by org id.
    pub async fn orgs_for_user(&self, user_id: u64) -> Result<Vec<(Organization, Role)>> {
        let state = self.state.read().await;
        let mut orgs = Vec::new();
        for membership in state
            .memberships
            .values()
            .filter(|membership| membership.user_id == user_id)
        {
            if let Some(org) = state.organizations.get(&membership.org_id) {
                orgs.push((org.clone(), membership.role));
            }
        }
        orgs.sort_by_key(|(org, _)| org.id);
        Ok(orgs)
    }

    async fn persist(&self, state: &OrgState) -> Result<()> {
        let content = serde_json::to_string_pretty(&StoredOrgState::from(state))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl OrganizationDirectory for FileOrgStore {
    async fn find_org(&self, id: u64) -> Result<Option<OrgRef>> {
        let state = self.state.read().await;
        Ok(state.organizations.get(&id).map(|org| OrgRef {
            id: org.id,
            parent_id: org.parent_id,
        }))
    }
}

#[async_trait]
impl MembershipDirectory for FileOrgStore {
    async fn memberships_for_user_in(
        &self,
        user_id: u64,
        org_ids: &[u64],
    ) -> Result<Vec<MembershipRef>> {
        let state = self.state.read().await;
        let mut found: Vec<MembershipRef> = state
            .memberships
            .values()
            .filter(|membership| {
                membership.user_id == user_id && org_ids.contains(&membership.org_id)
            })
            .map(|membership| MembershipRef {
                id: membership.id,
                user_id: membership.user_id,
                org_id: membership.org_id,
                role: membership.role,
            })
            .collect();
        found.sort_by_key(|membership| membership.id);
        Ok(found)
    }
}

async fn load_state(path: &Path) -> Result<OrgState> {
    if !path.exists() {
        return Ok(StoredOrgState::default().into());
    }
    let content = tokio::fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(StoredOrgState::default().into());
    }
    let stored: StoredOrgState = serde_json::from_str(&content)?;
    Ok(stored.into())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn build_store() -> (FileOrgStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileOrgStore::new(temp_dir.path().join("orgs.json"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn create_org_assigns_sequential_ids() {
        let (store, _temp_dir) = build_store().await;
        let parent = store.create_org("Parent", None).await.unwrap();
        let child = store.create_org("Child", Some(parent.id)).await.unwrap();
        assert_eq!(parent.id, 1);
        assert_eq!(child.id, 2);
        assert_eq!(child.parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn create_org_rejects_missing_parent() {
        let (store, _temp_dir) = build_store().await;
        let err = store.create_org("Orphan", Some(42)).await.unwrap_err();
        assert!(matches!(err, Error::OrganizationNotFound(42)));
    }

    #[tokio::test]
    async fn upsert_member_updates_role_in_place() {
        let (store, _temp_dir) = build_store().await;
        let org = store.create_org("Acme", None).await.unwrap();
        let first = store.upsert_member(10, org.id, Role::Viewer).await.unwrap();
        let second = store.upsert_member(10, org.id, Role::Admin).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::Admin);

        let memberships = store
            .memberships_for_user_in(10, &[org.id])
            .await
            .unwrap();
        assert_eq!(memberships.len(), 1);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("orgs.json");
        let org_id = {
            let store = FileOrgStore::new(&path).await.unwrap();
            let org = store.create_org("Acme", None).await.unwrap();
            store.upsert_member(10, org.id, Role::Owner).await.unwrap();
            org.id
        };

        let reopened = FileOrgStore::new(&path).await.unwrap();
        let org = reopened.get_org(org_id).await.unwrap().unwrap();
        assert_eq!(org.name, "Acme");
        let next = reopened.create_org("Second", None).await.unwrap();
        assert_eq!(next.id, org_id + 1);
    }

    #[tokio::test]
    async fn directory_returns_memberships_ascending_by_id() {
        let (store, _temp_dir) = build_store().await;
        let parent = store.create_org("Parent", None).await.unwrap();
        let child = store.create_org("Child", Some(parent.id)).await.unwrap();
        store.upsert_member(7, parent.id, Role::Viewer).await.unwrap();
        store.upsert_member(7, child.id, Role::Admin).await.unwrap();

        let memberships = store
            .memberships_for_user_in(7, &[child.id, parent.id])
            .await
            .unwrap();
        assert_eq!(memberships.len(), 2);
        assert!(memberships[0].id < memberships[1].id);
    }
}
