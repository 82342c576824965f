//! Access filtering.
//!
//! Visibility is recomputed from the user directory and document
//! permission sets on every retrieval, so grants and revocations take
//! effect on the next query with no cache invalidation step. An unknown
//! user or a user with no grants resolves to an empty set, never an
//! error, so callers cannot distinguish "no access" from "no matches".

use crate::store::VectorStore;
use crate::types::{DocumentId, Role, User};
use atrium_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockWriteGuard};

/// Trait for user directories.
pub trait UserStore: Send + Sync {
    /// Look up a user by identity. `None` for unknown identities.
    fn get_user(&self, identity: &str) -> AppResult<Option<User>>;
}

/// Compute the set of document ids the identity may see.
///
/// Admins see every stored document. Standard users see the union of
/// their direct grants and the documents whose permission set names them.
pub fn allowed_document_ids(
    users: &dyn UserStore,
    store: &dyn VectorStore,
    identity: &str,
) -> AppResult<HashSet<DocumentId>> {
    let user = match users.get_user(identity)? {
        Some(user) => user,
        None => {
            tracing::debug!("Unknown identity '{}', resolving to no access", identity);
            return Ok(HashSet::new());
        }
    };

    let documents = store.list_documents()?;

    if user.is_admin() {
        return Ok(documents.into_iter().map(|d| d.id).collect());
    }

    let mut allowed: HashSet<DocumentId> = user.grants.iter().cloned().collect();
    for doc in documents {
        if doc.permissions.iter().any(|p| p == identity) {
            allowed.insert(doc.id);
        }
    }

    Ok(allowed)
}

/// In-memory user directory.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, HashMap<String, User>>> {
        self.users
            .write()
            .map_err(|_| AppError::Store("user directory lock poisoned".to_string()))
    }

    /// Add or replace a user.
    pub fn upsert(&self, user: User) -> AppResult<()> {
        let mut users = self.write()?;
        users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Convenience constructor for a standard user with no grants.
    pub fn add_standard(&self, identity: &str) -> AppResult<()> {
        self.upsert(User {
            id: identity.to_string(),
            role: Role::Standard,
            grants: Vec::new(),
        })
    }

    /// Convenience constructor for an admin.
    pub fn add_admin(&self, identity: &str) -> AppResult<()> {
        self.upsert(User {
            id: identity.to_string(),
            role: Role::Admin,
            grants: Vec::new(),
        })
    }

    /// Add a direct document grant to an existing user. No-op for unknown
    /// identities.
    pub fn grant(&self, identity: &str, document_id: &str) -> AppResult<()> {
        let mut users = self.write()?;
        if let Some(user) = users.get_mut(identity) {
            if !user.grants.iter().any(|g| g == document_id) {
                user.grants.push(document_id.to_string());
            }
        }
        Ok(())
    }

    /// Remove a direct document grant. No-op when absent.
    pub fn revoke(&self, identity: &str, document_id: &str) -> AppResult<()> {
        let mut users = self.write()?;
        if let Some(user) = users.get_mut(identity) {
            user.grants.retain(|g| g != document_id);
        }
        Ok(())
    }
}

impl UserStore for InMemoryUserDirectory {
    fn get_user(&self, identity: &str) -> AppResult<Option<User>> {
        let users = self
            .users
            .read()
            .map_err(|_| AppError::Store("user directory lock poisoned".to_string()))?;
        Ok(users.get(identity).cloned())
    }
}
