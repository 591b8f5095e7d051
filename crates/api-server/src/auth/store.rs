use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u64,
    email: String,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct UserState {
    users: HashMap<u64, User>,
    next_user_id: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredUserState {
    users: Vec<User>,
}

impl From<StoredUserState> for UserState {
    fn from(value: StoredUserState) -> Self {
        let next_user_id = value.users.iter().map(|user| user.id).max().unwrap_or(0) + 1;
        Self {
            users: value
                .users
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
            next_user_id,
        }
    }
}

impl From<&UserState> for StoredUserState {
    fn from(value: &UserState) -> Self {
        let mut users: Vec<User> = value.users.values().cloned().collect();
        users.sort_by_key(|user| user.id);
        Self { users }
    }
}

/// File-backed user store
pub struct UserStore {
    state: RwLock<UserState>,
    path: PathBuf,
}

impl UserStore {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let state = load_state(&path).await?;
        Ok(Self {
            state: RwLock::new(state),
            path,
        })
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserSummary, AuthError> {
        let normalized_email = normalize_email(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("Name cannot be empty".to_string()));
        }

        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|user| user.email == normalized_email)
        {
            return Err(AuthError::Conflict(format!(
                "User '{}' already exists",
                normalized_email
            )));
        }

        let user = User {
            id: state.next_user_id,
            email: normalized_email,
            name: name.to_string(),
            password_hash: hash_password(password),
            created_at: Utc::now(),
        };
        state.next_user_id += 1;
        state.users.insert(user.id, user.clone());
        persist_state(&self.path, &state).await?;
        Ok(user_to_summary(&user))
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Option<UserSummary> {
        let normalized_email = normalize_email(email).ok()?;
        let state = self.state.read().await;
        let user = state
            .users
            .values()
            .find(|user| user.email == normalized_email)?;
        if !verify_password(&user.password_hash, password) {
            return None;
        }
        Some(user_to_summary(user))
    }

    pub async fn get(&self, id: u64) -> Option<UserSummary> {
        let state = self.state.read().await;
        state.users.get(&id).map(user_to_summary)
    }
}

fn user_to_summary(user: &User) -> UserSummary {
    UserSummary {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        created_at: user.created_at,
    }
}

async fn load_state(path: &Path) -> Result<UserState, AuthError> {
    if !path.exists() {
        return Ok(StoredUserState::default().into());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AuthError::Storage(format!("Failed to read user state: {}", err)))?;
    if content.trim().is_empty() {
        return Ok(StoredUserState::default().into());
    }
    let stored: StoredUserState = serde_json::from_str(&content)
        .map_err(|err| AuthError::Storage(format!("Failed to parse user state: {}", err)))?;
    Ok(stored.into())
}

async fn persist_state(path: &Path, state: &UserState) -> Result<(), AuthError> {
    let content = serde_json::to_string_pretty(&StoredUserState::from(state))
        .map_err(|err| AuthError::Storage(format!("Failed to serialize user state: {}", err)))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            AuthError::Storage(format!("Failed to create user store dir: {}", err))
        })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|err| AuthError::Storage(format!("Failed to write user state: {}", err)))?;
    Ok(())
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(AuthError::InvalidInput("Invalid email".to_string()));
    }
    Ok(normalized)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::InvalidInput(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> String {
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    format!(
        "v1${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

fn verify_password(stored_hash: &str, password: &str) -> bool {
    let mut parts = stored_hash.split('$');
    let version = parts.next();
    let encoded_salt = parts.next();
    let encoded_digest = parts.next();
    let (Some(encoded_salt), Some(encoded_digest)) = (encoded_salt, encoded_digest) else {
        return false;
    };
    if version != Some("v1") {
        return false;
    }

    let Ok(salt) = URL_SAFE_NO_PAD.decode(encoded_salt) else {
        return false;
    };
    let Ok(expected_digest) = URL_SAFE_NO_PAD.decode(encoded_digest) else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    let actual_digest = hasher.finalize();
    expected_digest == actual_digest.as_slice()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn build_store() -> (UserStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = UserStore::new(temp_dir.path().join("users.json"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn register_and_authenticate_roundtrip() {
        let (store, _temp_dir) = build_store().await;
        let user = store
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        assert_eq!(user.id, 1);

        let authed = store
            .authenticate("Owner@Example.com", "verysecurepw")
            .await
            .unwrap();
        assert_eq!(authed.id, user.id);

        assert!(store
            .authenticate("owner@example.com", "wrong-password")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (store, _temp_dir) = build_store().await;
        store
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        let err = store
            .register("OWNER@example.com", "otherpassword", "Imposter")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let (store, _temp_dir) = build_store().await;
        let err = store
            .register("owner@example.com", "short", "Owner")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
    }
}
