//! Session lookup
//!
//! The pipeline never authenticates on its own; it asks a [`SessionProvider`]
//! for the principal of the current call.

use async_trait::async_trait;
use dermascan_core::{AppError, AppResult, Config};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner_id: String,
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            access_token: Some(access_token.into()),
        }
    }

    /// Bearer credential, if the session carries a non-empty one.
    pub fn credential(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Credential or `MissingCredential`.
    pub fn require_credential(&self) -> AppResult<&str> {
        self.credential().ok_or(AppError::MissingCredential)
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current session, `None` when nobody is signed in.
    async fn current_session(&self) -> AppResult<Option<Session>>;
}

/// Resolve the current session and require an owner and a credential.
pub async fn authenticated_session(provider: &dyn SessionProvider) -> AppResult<Session> {
    let session = provider
        .current_session()
        .await?
        .ok_or(AppError::MissingCredential)?;
    if session.owner_id.trim().is_empty() {
        return Err(AppError::MissingCredential);
    }
    session.require_credential()?;
    Ok(session)
}

/// Fixed session, used by the CLI and service accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionProvider {
    session: Option<Session>,
}

impl StaticSessionProvider {
    pub fn new(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn anonymous() -> Self {
        Self { session: None }
    }

    /// Session from `DERMASCAN_OWNER_ID` / `DERMASCAN_ACCESS_TOKEN`.
    pub fn from_config(config: &Config) -> Self {
        let session = config.owner_id.as_ref().map(|owner_id| Session {
            owner_id: owner_id.clone(),
            access_token: config.access_token.clone(),
        });
        Self { session }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_session(&self) -> AppResult<Option<Session>> {
        Ok(self.session.clone())
    }
}
