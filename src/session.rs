//! Session keys shared with the authentication collaborator, and the
//! principal the messaging core reads back out of them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub const USER_ID: &str = "user_id";
pub const ROLE: &str = "role";

/// Anonymous visitors are named under this prefix and nobody else is.
pub const GUEST_PREFIX: &str = "guest:";

pub fn guest_identity(id: Uuid) -> String {
    format!("{GUEST_PREFIX}{}", id.hyphenated())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    Staff,
    Support,
    Patient,
    Guest,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Doctor,
        Role::Staff,
        Role::Support,
        Role::Patient,
        Role::Guest,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Staff => "staff",
            Role::Support => "support",
            Role::Patient => "patient",
            Role::Guest => "guest",
        };
        f.write_str(name)
    }
}

/// A resolved sender: an opaque identity plus the role it acts under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity: String,
    pub role: Role,
}

impl Principal {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }

    pub fn guest(id: Uuid) -> Self {
        Self::new(guest_identity(id), Role::Guest)
    }

    pub fn is_guest(&self) -> bool {
        self.role == Role::Guest
    }

    /// Guests hold identities in the guest namespace, everyone else outside it.
    pub fn in_own_namespace(&self) -> bool {
        self.is_guest() == self.identity.starts_with(GUEST_PREFIX)
    }

    pub async fn from_session(session: &Session) -> AppResult<Option<Principal>> {
        let Some(identity) = session.get::<String>(USER_ID).await? else {
            return Ok(None);
        };
        let Some(role) = session.get::<Role>(ROLE).await? else {
            return Ok(None);
        };

        let principal = Principal { identity, role };
        if !principal.in_own_namespace() {
            tracing::warn!(identity = %principal.identity, role = %principal.role, "session principal outside its namespace");
            return Err(AppError::Forbidden("identity does not match its role".to_owned()));
        }
        Ok(Some(principal))
    }

    /// Like [`Principal::from_session`] but rejects anonymous requests.
    pub async fn require(session: &Session) -> AppResult<Principal> {
        Self::from_session(session).await?.ok_or(AppError::Unauthorized)
    }
}

/// Called by the authentication collaborator once it has verified a user.
pub async fn sign_in(session: &Session, principal: &Principal) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_ID, &principal.identity).await?;
    session.insert(ROLE, principal.role).await?;
    Ok(())
}

pub async fn sign_out(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn blank_session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn anonymous_session_is_rejected() {
        let session = blank_session();
        assert!(Principal::from_session(&session).await.unwrap().is_none());
        assert!(matches!(Principal::require(&session).await, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn signed_in_principal_round_trips() {
        let session = blank_session();
        sign_in(&session, &Principal::new("d1", Role::Doctor)).await.unwrap();

        let principal = Principal::require(&session).await.unwrap();
        assert_eq!(principal.identity, "d1");
        assert_eq!(principal.role, Role::Doctor);

        sign_out(&session).await.unwrap();
        assert!(Principal::from_session(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_cannot_carry_a_guest_namespaced_staff_identity() {
        let session = blank_session();
        sign_in(&session, &Principal::new("guest:67e55044-10b1-426f-9247-bb680e5fe0c8", Role::Staff))
            .await
            .unwrap();
        assert!(matches!(Principal::require(&session).await, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn guests_live_in_their_own_namespace() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let guest = Principal::guest(id);
        assert_eq!(guest.identity, "guest:67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!(guest.in_own_namespace());

        assert!(!Principal::new(id.to_string(), Role::Guest).in_own_namespace());
        assert!(Principal::new(id.to_string(), Role::Staff).in_own_namespace());
    }

    #[test]
    fn role_display_matches_the_wire_name() {
        for role in Role::ALL {
            assert_eq!(serde_json::to_string(&role).unwrap(), format!("\"{role}\""));
        }
    }

    #[test]
    fn roles_use_snake_case_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::Support).unwrap(), r#""support""#);
        let role: Role = serde_json::from_str(r#""patient""#).unwrap();
        assert_eq!(role, Role::Patient);
    }
}
