//! Auth service - registration and identity resolution
//!
//! Turns a login attempt into an `Identity`. Local login answers every
//! failure with the same `InvalidCredentials`; the actual cause goes to
//! the internal event log only.

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{
    normalize_email, Identity, ProviderAssertion, RegistrationForm, MSG_EMAIL_TAKEN,
};
use crate::ports::{Clock, CredentialStore};
use crate::services::{LogEvent, LoggingService, PasswordService};

/// Internal cause of a failed local login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginFailure {
    UnknownEmail,
    NoPasswordSet,
    PasswordMismatch,
}

impl LoginFailure {
    fn as_str(&self) -> &'static str {
        match self {
            LoginFailure::UnknownEmail => "unknown_email",
            LoginFailure::NoPasswordSet => "no_password_set",
            LoginFailure::PasswordMismatch => "password_mismatch",
        }
    }
}

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    passwords: PasswordService,
    clock: Arc<dyn Clock>,
    logger: Option<Arc<LoggingService>>,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        passwords: PasswordService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            passwords,
            clock,
            logger: None,
        }
    }

    /// Send login failure causes and account events to this log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn record(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::debug!(error = %e, "failed to write auth event");
            }
        }
    }

    /// Create a password identity
    ///
    /// All field rules are checked together and reported as one
    /// `Validation` error. Only a valid form reaches the uniqueness check,
    /// which fails with `Conflict`.
    pub async fn register(&self, form: &RegistrationForm) -> Result<Identity> {
        form.validate()?;

        let email = form.normalized_email();
        if self.credentials.find_by_email(&email).await?.is_some() {
            return Err(Error::conflict(MSG_EMAIL_TAKEN));
        }

        let hash = self.passwords.hash(form.password.clone()).await?;
        let identity = Identity::with_password(form.name.trim(), &email, hash, self.clock.now());

        // A concurrent registration can still win the race; the store's
        // unique index turns that into the same conflict.
        let identity = self
            .credentials
            .create_identity(identity)
            .await
            .map_err(|e| match e {
                Error::Conflict(_) => Error::conflict(MSG_EMAIL_TAKEN),
                other => other,
            })?;

        self.record(LogEvent::new("identity_registered").with_identity(identity.id));
        Ok(identity)
    }

    /// Email and password login
    pub async fn login_local(&self, email: &str, plaintext: &str) -> Result<Identity> {
        let email = normalize_email(email);
        let identity = self.credentials.find_by_email(&email).await?;

        let stored_hash = identity.as_ref().and_then(|i| i.password_hash.clone());
        let verified = self.passwords.verify(plaintext.to_string(), stored_hash).await;

        match identity {
            Some(identity) if verified => {
                self.record(LogEvent::new("login_succeeded").with_identity(identity.id));
                Ok(identity)
            }
            Some(identity) => {
                let cause = if identity.password_hash.is_none() {
                    LoginFailure::NoPasswordSet
                } else {
                    LoginFailure::PasswordMismatch
                };
                self.login_failed(cause, Some(&identity));
                Err(Error::InvalidCredentials)
            }
            None => {
                self.login_failed(LoginFailure::UnknownEmail, None);
                Err(Error::InvalidCredentials)
            }
        }
    }

    fn login_failed(&self, cause: LoginFailure, identity: Option<&Identity>) {
        tracing::debug!("local login rejected");
        let mut event = LogEvent::new("login_failed").with_error(cause.as_str());
        if let Some(identity) = identity {
            event = event.with_identity(identity.id);
        }
        self.record(event);
    }

    /// Resolve a provider assertion, creating the identity on first sight
    ///
    /// A known external id returns the stored identity unchanged. An unseen
    /// one creates a fresh identity from the assertion; if its email already
    /// belongs to another identity the store reports `Conflict` and nothing
    /// is merged (see `link_external`).
    pub async fn login_external(&self, assertion: &ProviderAssertion) -> Result<Identity> {
        let external_id = assertion.qualified_id();
        if assertion.subject.trim().is_empty() {
            return Err(Error::invalid_input("provider assertion has no subject"));
        }

        if let Some(identity) = self.credentials.find_by_external_id(&external_id).await? {
            self.record(
                LogEvent::new("login_external")
                    .with_identity(identity.id)
                    .with_provider(assertion.provider.as_str()),
            );
            return Ok(identity);
        }

        let identity = Identity::from_assertion(assertion, self.clock.now());
        match self.credentials.create_identity(identity).await {
            Ok(identity) => {
                self.record(
                    LogEvent::new("identity_created_external")
                        .with_identity(identity.id)
                        .with_provider(assertion.provider.as_str()),
                );
                Ok(identity)
            }
            Err(Error::Conflict(msg)) => {
                // Lost a race against the same subject: that identity wins
                if let Some(existing) = self.credentials.find_by_external_id(&external_id).await? {
                    return Ok(existing);
                }
                self.record(
                    LogEvent::new("login_external_failed")
                        .with_provider(assertion.provider.as_str())
                        .with_error("email_in_use"),
                );
                Err(Error::Conflict(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Bind a provider assertion to an already resolved identity
    ///
    /// Linking the same pair twice is a no-op. An external id bound to a
    /// different identity, or an identity already bound to a different
    /// external id, is a `Conflict`.
    pub async fn link_external(
        &self,
        identity: &Identity,
        assertion: &ProviderAssertion,
    ) -> Result<Identity> {
        let external_id = assertion.qualified_id();
        if assertion.subject.trim().is_empty() {
            return Err(Error::invalid_input("provider assertion has no subject"));
        }

        if let Some(owner) = self.credentials.find_by_external_id(&external_id).await? {
            if owner.id == identity.id {
                return Ok(owner);
            }
            return Err(Error::conflict(
                "external account already linked to another identity",
            ));
        }

        let current = self
            .credentials
            .find_by_id(identity.id)
            .await?
            .ok_or_else(|| Error::not_found(format!("identity {}", identity.id)))?;
        if current.external_id.is_some() {
            return Err(Error::conflict(
                "identity is already linked to a different external account",
            ));
        }

        let linked = self
            .credentials
            .link_external_id(identity.id, &external_id, assertion.avatar_ref.as_deref())
            .await?;

        self.record(
            LogEvent::new("identity_linked")
                .with_identity(linked.id)
                .with_provider(assertion.provider.as_str()),
        );
        Ok(linked)
    }

    /// Identity by id, for callers holding only a reference
    pub async fn find_identity(&self, id: uuid::Uuid) -> Result<Option<Identity>> {
        self.credentials.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::Argon2Params;
    use crate::ports::SystemClock;
    use crate::services::EntryPoint;

    fn setup() -> (AuthService, Arc<LoggingService>) {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        let logger = Arc::new(LoggingService::open_in_memory(EntryPoint::Cli, "test").unwrap());
        let service = AuthService::new(
            Arc::new(repo),
            PasswordService::new(&Argon2Params::insecure_fast()).unwrap(),
            Arc::new(SystemClock),
        )
        .with_logger(Arc::clone(&logger));
        (service, logger)
    }

    #[tokio::test]
    async fn test_failure_causes_only_in_event_log() {
        let (auth, logger) = setup();
        auth.register(&RegistrationForm::new("Ann", "a@x.com", "secret1", "secret1"))
            .await
            .unwrap();

        let unknown = auth.login_local("b@x.com", "secret1").await.unwrap_err();
        let wrong = auth.login_local("a@x.com", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());

        let causes: Vec<String> = logger
            .get_by_event("login_failed", 10)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.error_message)
            .collect();
        assert!(causes.contains(&"unknown_email".to_string()));
        assert!(causes.contains(&"password_mismatch".to_string()));
    }

    #[tokio::test]
    async fn test_external_identity_has_no_password() {
        let (auth, logger) = setup();
        let assertion = ProviderAssertion::new("github", "7").with_email("g@x.com");
        auth.login_external(&assertion).await.unwrap();

        let err = auth.login_local("g@x.com", "anything").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));

        let entries = logger.get_by_event("login_failed", 10).unwrap();
        assert_eq!(entries[0].error_message.as_deref(), Some("no_password_set"));
    }

    #[tokio::test]
    async fn test_blank_subject_rejected() {
        let (auth, _) = setup();
        let err = auth
            .login_external(&ProviderAssertion::new("github", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
