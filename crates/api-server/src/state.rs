//! Application state

use std::path::PathBuf;
use std::sync::Arc;

use tb_core::org::FileOrgStore;
use tb_core::rbac::RbacGuard;
use tb_core::task::FileTaskStore;
use tb_core::Error;

use crate::audit::AuditStore;
use crate::auth::UserStore;
use crate::rbac::OperationPermissions;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    user_store: UserStore,
    org_store: Arc<FileOrgStore>,
    task_store: Arc<FileTaskStore>,
    audit_store: AuditStore,
    guard: RbacGuard,
    permissions: OperationPermissions,
}

impl AppState {
    /// Create a new AppState with the given data directory
    pub async fn new(data_dir: PathBuf) -> tb_core::Result<Self> {
        let user_store = UserStore::new(data_dir.join("users.json"))
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;
        let org_store = Arc::new(FileOrgStore::new(data_dir.join("orgs.json")).await?);
        let task_store = Arc::new(FileTaskStore::new(data_dir.join("tasks.json")).await?);
        let audit_store = AuditStore::new(data_dir.join("audit"))
            .await
            .map_err(Error::Io)?;

        let guard = RbacGuard::new(
            Arc::clone(&org_store) as _,
            Arc::clone(&org_store) as _,
            Arc::clone(&task_store) as _,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                user_store,
                org_store,
                task_store,
                audit_store,
                guard,
                permissions: OperationPermissions::new(),
            }),
        })
    }

    pub fn user_store(&self) -> &UserStore {
        &self.inner.user_store
    }

    pub fn org_store(&self) -> &FileOrgStore {
        &self.inner.org_store
    }

    pub fn task_store(&self) -> &FileTaskStore {
        &self.inner.task_store
    }

    pub fn audit_store(&self) -> &AuditStore {
        &self.inner.audit_store
    }

    pub fn guard(&self) -> &RbacGuard {
        &self.inner.guard
    }

    pub fn permissions(&self) -> &OperationPermissions {
        &self.inner.permissions
    }
}
