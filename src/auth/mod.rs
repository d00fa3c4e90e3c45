/*!
 * # Caller identity
 *
 * Authentication itself happens upstream. Requests arrive with an
 * `x-actor-id` header (account id or email) and optionally `x-actor-role`;
 * the id is resolved through an [`AccountDirectory`] and the resulting
 * [`Actor`] drives every ownership and role check in the services.
 */

use crate::{errors::ServiceError, AppState};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Staff,
    Vendor,
    User,
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn staff(id: Uuid) -> Self {
        Self::new(id, Role::Staff)
    }

    pub fn vendor(id: Uuid) -> Self {
        Self::new(id, Role::Vendor)
    }

    pub fn user(id: Uuid) -> Self {
        Self::new(id, Role::User)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Staff and admins operate on any order or return.
    pub fn is_back_office(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Staff)
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("admin role required".to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Account record, tagged by the kind of principal it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Account {
    Admin(AccountProfile),
    Staff(AccountProfile),
    Vendor(AccountProfile),
    User(AccountProfile),
}

impl Account {
    pub fn profile(&self) -> &AccountProfile {
        match self {
            Account::Admin(p) | Account::Staff(p) | Account::Vendor(p) | Account::User(p) => p,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Account::Admin(_) => Role::Admin,
            Account::Staff(_) => Role::Staff,
            Account::Vendor(_) => Role::Vendor,
            Account::User(_) => Role::User,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.profile().id, self.role())
    }
}

/// Resolves an identifier (account id or email) to an account of any role.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_by_identifier(&self, key: &str) -> Result<Account, ServiceError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountDirectory {
    by_id: Arc<DashMap<Uuid, Account>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        let profile = account.profile();
        self.by_email
            .insert(profile.email.to_ascii_lowercase(), profile.id);
        self.by_id.insert(profile.id, account);
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_by_identifier(&self, key: &str) -> Result<Account, ServiceError> {
        let id = match Uuid::parse_str(key) {
            Ok(id) => Some(id),
            Err(_) => self
                .by_email
                .get(&key.to_ascii_lowercase())
                .map(|entry| *entry.value()),
        };

        id.and_then(|id| self.by_id.get(&id).map(|entry| entry.value().clone()))
            .ok_or_else(|| ServiceError::Unauthorized(format!("unknown account {}", key)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("missing caller identity".to_string()))?;

        let account = state.accounts.find_by_identifier(key).await?;
        let actor = account.actor();

        if let Some(claimed) = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let claimed: Role = claimed
                .parse()
                .map_err(|_| ServiceError::Unauthorized(format!("unknown role {}", claimed)))?;
            if claimed != actor.role {
                warn!(actor_id = %actor.id, claimed = %claimed, actual = %actor.role, "role header mismatch");
                return Err(ServiceError::Unauthorized(
                    "role does not match account".to_string(),
                ));
            }
        }

        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn vendor_account() -> Account {
        Account::Vendor(AccountProfile {
            id: Uuid::new_v4(),
            email: "Shop@Example.com".to_string(),
            name: "Shop".to_string(),
        })
    }

    #[tokio::test]
    async fn resolves_by_id_and_case_insensitive_email() {
        let directory = InMemoryAccountDirectory::new();
        let account = vendor_account();
        let id = account.profile().id;
        directory.insert(account.clone());

        let by_id = directory.find_by_identifier(&id.to_string()).await.unwrap();
        assert_eq!(by_id, account);

        let by_email = directory
            .find_by_identifier("shop@example.com")
            .await
            .unwrap();
        assert_eq!(by_email.actor(), Actor::vendor(id));
    }

    #[tokio::test]
    async fn unknown_identifier_is_unauthorized() {
        let directory = InMemoryAccountDirectory::new();
        assert_matches!(
            directory.find_by_identifier("nobody@example.com").await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn only_admins_pass_admin_gate() {
        let id = Uuid::new_v4();
        assert!(Actor::admin(id).require_admin().is_ok());
        assert_matches!(
            Actor::staff(id).require_admin(),
            Err(ServiceError::Forbidden(_))
        );
        assert!(Actor::staff(id).is_back_office());
        assert!(!Actor::vendor(id).is_back_office());
    }
}
