use std::future::Future;

use time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    error::{AuthError, AuthResult},
    jwt::AccessTokens,
    password::CredentialHasher,
    refresh::RefreshTokenStore,
};

/// Tokens handed out at login.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

/// The two narrow interfaces the HTTP layer calls: credentials and tokens.
#[derive(Clone)]
pub struct SessionService {
    pub hasher: CredentialHasher,
    pub access_tokens: AccessTokens,
    pub refresh_tokens: RefreshTokenStore,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl SessionService {
    /// Hashes off the async runtime; argon2 is deliberately slow.
    pub async fn hash_password(&self, plain: &str) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        let plain = plain.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| AuthError::HashingFailure(e.to_string()))?
    }

    /// Checks `plain` against the stored hash of the account, if any.
    ///
    /// An unknown account still pays for one hash so response time does not
    /// tell it apart from a wrong password.
    pub async fn check_password(&self, plain: &str, stored: Option<&str>) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let plain = plain.to_string();
        let stored = stored.map(str::to_string);
        tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&plain, &hash),
            None => hasher.hash(&plain).map(|_| false),
        })
        .await
        .map_err(|e| AuthError::HashingFailure(e.to_string()))?
    }

    pub async fn start_session(&self, user_id: Uuid) -> AuthResult<Session> {
        let access_token = self.access_tokens.issue(user_id, self.access_ttl)?;
        let refresh_token = self.refresh_tokens.issue(user_id, self.refresh_ttl).await?;
        info!(user_id = %user_id, "session started");
        Ok(Session {
            access_token,
            refresh_token,
        })
    }

    /// New access token for a live refresh token. The refresh token itself is
    /// left as is.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<String> {
        let user_id = self.refresh_tokens.validate(refresh_token).await?;
        let token = self.access_tokens.issue(user_id, self.access_ttl)?;
        debug!(user_id = %user_id, "access token refreshed");
        Ok(token)
    }

    pub async fn revoke(&self, refresh_token: &str) -> AuthResult<()> {
        self.refresh_tokens.revoke(refresh_token).await
    }

    /// Ends every session of a user whose credential changed.
    pub async fn end_all_sessions(&self, user_id: Uuid) -> AuthResult<u64> {
        self.refresh_tokens.revoke_all_for_user(user_id).await
    }

    /// Ends every session of `user_id`, then runs `write`. If revocation
    /// fails the stored credential is never touched.
    pub async fn replace_credentials<T, F, Fut>(&self, user_id: Uuid, write: F) -> AuthResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let revoked = self.end_all_sessions(user_id).await?;
        let written = write().await?;
        debug!(user_id = %user_id, revoked, "credentials replaced");
        Ok(written)
    }

    pub fn authenticate(&self, token: &str) -> AuthResult<Uuid> {
        self.access_tokens.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo::{tests::Unreachable, InMemoryRefreshTokenRepository, RefreshTokenRepository},
        clock::{Clock, ManualClock},
    };
    use argon2::Params;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    fn service_with(repo: Arc<dyn RefreshTokenRepository>) -> (SessionService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let shared: Arc<dyn Clock> = clock.clone();
        let service = SessionService {
            hasher: CredentialHasher::with_params(Params::new(1024, 3, 1, Some(32)).expect("params")),
            access_tokens: AccessTokens::new("test-secret", shared.clone()),
            refresh_tokens: RefreshTokenStore::new(repo, shared),
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(60),
        };
        (service, clock)
    }

    fn service() -> (SessionService, Arc<ManualClock>) {
        service_with(Arc::new(InMemoryRefreshTokenRepository::new()))
    }

    #[tokio::test]
    async fn check_password_distinguishes_wrong_from_corrupt() {
        let (svc, _) = service();
        let hash = svc.hash_password("p4ssw0rd").await.expect("hash");
        assert!(svc.check_password("p4ssw0rd", Some(&hash)).await.expect("check"));
        assert!(!svc.check_password("nope", Some(&hash)).await.expect("check"));
        assert!(!svc.check_password("p4ssw0rd", None).await.expect("unknown account"));
        assert!(matches!(
            svc.check_password("p4ssw0rd", Some("garbage")).await,
            Err(AuthError::HashingFailure(_))
        ));
    }

    #[tokio::test]
    async fn refresh_outlives_access_token() {
        let (svc, clock) = service();
        let user = Uuid::new_v4();
        let session = svc.start_session(user).await.expect("session");

        clock.advance(Duration::hours(2));
        assert!(matches!(svc.authenticate(&session.access_token), Err(AuthError::Expired)));

        let fresh = svc.refresh(&session.refresh_token).await.expect("refresh");
        assert_eq!(svc.authenticate(&fresh).expect("fresh token"), user);
    }

    #[tokio::test]
    async fn end_all_sessions_blocks_refresh() {
        let (svc, _) = service();
        let user = Uuid::new_v4();
        let one = svc.start_session(user).await.expect("session");
        let two = svc.start_session(user).await.expect("session");

        assert_eq!(svc.end_all_sessions(user).await.expect("end"), 2);
        assert!(matches!(svc.refresh(&one.refresh_token).await, Err(AuthError::Revoked)));
        assert!(matches!(svc.refresh(&two.refresh_token).await, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn replace_credentials_revokes_before_writing() {
        let (svc, _) = service();
        let user = Uuid::new_v4();
        let session = svc.start_session(user).await.expect("session");

        let written = svc
            .replace_credentials(user, || async { Ok("new-hash") })
            .await
            .expect("replace");
        assert_eq!(written, "new-hash");
        assert!(matches!(svc.refresh(&session.refresh_token).await, Err(AuthError::Revoked)));

        let err = svc
            .replace_credentials(user, || async {
                Err::<(), _>(anyhow::anyhow!("write failed"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
    }

    #[tokio::test]
    async fn failed_revocation_leaves_credentials_untouched() {
        let (svc, _) = service_with(Arc::new(Unreachable));
        let wrote = AtomicBool::new(false);
        let err = svc
            .replace_credentials(Uuid::new_v4(), || async {
                wrote.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
        assert!(!wrote.load(Ordering::SeqCst));
    }
}
