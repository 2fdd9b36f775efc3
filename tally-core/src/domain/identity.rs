//! Identity domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user of the tracker
///
/// An identity is usable for login once it has a password hash (local
/// login) or an external id (provider login). Email and external id are
/// globally unique when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub display_name: String,
    /// Always stored lowercase
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Provider-qualified subject, e.g. `github:583231`
    pub external_id: Option<String>,
    pub avatar_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Identity created through registration
    pub fn with_password(
        display_name: impl Into<String>,
        email: &str,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            email: Some(normalize_email(email)),
            password_hash: Some(password_hash),
            external_id: None,
            avatar_ref: None,
            created_at,
        }
    }

    /// Identity created on the first sight of a provider subject
    pub fn from_assertion(assertion: &ProviderAssertion, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: assertion.resolved_display_name(),
            email: assertion.email.as_deref().map(normalize_email),
            password_hash: None,
            external_id: Some(assertion.qualified_id()),
            avatar_ref: assertion.avatar_ref.clone(),
            created_at,
        }
    }

    pub fn can_login(&self) -> bool {
        self.password_hash.is_some() || self.external_id.is_some()
    }
}

/// Lowercase and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Profile asserted by an external identity provider after its handshake
///
/// Only the fields below are read; the handshake itself happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAssertion {
    /// Provider name, e.g. `github`
    pub provider: String,
    /// Provider-issued subject id
    pub subject: String,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar_ref: Option<String>,
}

impl ProviderAssertion {
    pub fn new(provider: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            subject: subject.into(),
            display_name: None,
            username: None,
            email: None,
            avatar_ref: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }

    /// External id as stored on the identity
    pub fn qualified_id(&self) -> String {
        format!(
            "{}:{}",
            self.provider.trim().to_lowercase(),
            self.subject.trim()
        )
    }

    /// Display name, falling back to username and then the subject id
    pub fn resolved_display_name(&self) -> String {
        [self.display_name.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(self.subject.trim())
            .to_string()
    }
}
