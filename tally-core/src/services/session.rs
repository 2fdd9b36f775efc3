//! Session service - issue, resolve and destroy session tokens
//!
//! Resolution failure is never an error: an expired, unknown or dangling
//! session simply resolves to `None` and the caller treats it as "not
//! authenticated". Errors are reserved for store failures.

use std::sync::Arc;

use chrono::Duration;

use crate::domain::result::{Error, Result};
use crate::domain::{expiry_after, Identity, Session, SessionToken};
use crate::ports::{Clock, CredentialStore, SessionStore};

pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    sliding: bool,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        sliding: bool,
    ) -> Self {
        Self {
            sessions,
            credentials,
            clock,
            ttl,
            sliding,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session for an existing identity
    ///
    /// The returned token is the only copy; the store keeps its digest.
    pub async fn create(&self, identity_id: uuid::Uuid) -> Result<SessionToken> {
        if self.credentials.find_by_id(identity_id).await?.is_none() {
            return Err(Error::not_found(format!("identity {}", identity_id)));
        }

        let token = SessionToken::generate();
        let session = Session::new(&token, identity_id, self.clock.now(), self.ttl);
        self.sessions.insert_session(&session).await?;
        Ok(token)
    }

    /// The identity behind a token, if the session is still good
    ///
    /// Expired sessions and sessions whose identity no longer exists are
    /// deleted on the way out. With sliding expiry, a successful resolve
    /// pushes the expiry to now + ttl.
    pub async fn resolve(&self, token: &SessionToken) -> Result<Option<Identity>> {
        let token_hash = token.digest();
        let session = match self.sessions.get_session(&token_hash).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        let now = self.clock.now();
        if session.is_expired(now) {
            self.sessions.delete_session(&token_hash).await?;
            return Ok(None);
        }

        let identity = match self.credentials.find_by_id(session.identity_id).await? {
            Some(identity) => identity,
            None => {
                tracing::debug!(identity_id = %session.identity_id, "dropping dangling session");
                self.sessions.delete_session(&token_hash).await?;
                return Ok(None);
            }
        };

        if self.sliding {
            self.sessions.touch_session(&token_hash, expiry_after(now, self.ttl)).await?;
        }
        Ok(Some(identity))
    }

    /// End a session; unknown tokens are fine
    pub async fn destroy(&self, token: &SessionToken) -> Result<()> {
        self.sessions.delete_session(&token.digest()).await?;
        Ok(())
    }

    /// Delete every expired session, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.sessions.delete_expired_sessions(self.clock.now()).await?;
        if purged > 0 {
            tracing::info!(purged, "purged expired sessions");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;
    use crate::adapters::duckdb::DuckDbRepository;
    use chrono::{TimeZone, Utc};

    async fn setup(sliding: bool) -> (SessionService, Arc<ManualClock>, Identity) {
        let repo = Arc::new(DuckDbRepository::open_in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));

        let identity = repo
            .create_identity(Identity::with_password("Ann", "a@x.com", "h".into(), clock.now()))
            .await
            .unwrap();

        let service = SessionService::new(
            repo.clone(),
            repo,
            clock.clone(),
            Duration::hours(1),
            sliding,
        );
        (service, clock, identity)
    }

    #[tokio::test]
    async fn test_create_requires_existing_identity() {
        let (service, _, _) = setup(false).await;
        let err = service.create(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fixed_expiry() {
        let (service, clock, identity) = setup(false).await;
        let token = service.create(identity.id).await.unwrap();

        clock.advance(Duration::minutes(59));
        assert!(service.resolve(&token).await.unwrap().is_some());

        clock.advance(Duration::minutes(1));
        assert!(service.resolve(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sliding_expiry_extends_on_use() {
        let (service, clock, identity) = setup(true).await;
        let token = service.create(identity.id).await.unwrap();

        for _ in 0..3 {
            clock.advance(Duration::minutes(45));
            assert!(service.resolve(&token).await.unwrap().is_some());
        }

        clock.advance(Duration::minutes(61));
        assert!(service.resolve(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (service, clock, identity) = setup(false).await;
        service.create(identity.id).await.unwrap();
        service.create(identity.id).await.unwrap();

        assert_eq!(service.purge_expired().await.unwrap(), 0);
        clock.advance(Duration::hours(2));
        let live = service.create(identity.id).await.unwrap();

        assert_eq!(service.purge_expired().await.unwrap(), 2);
        assert!(service.resolve(&live).await.unwrap().is_some());
    }
}
