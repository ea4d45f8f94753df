use std::sync::Arc;

use rand::{rngs::OsRng, CryptoRng, RngCore};
use time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    error::{AuthError, AuthResult},
    repo::RefreshTokenRepository,
};
use crate::clock::Clock;

const TOKEN_BYTES: usize = 32;

/// Draws 32 bytes from `rng` and hex-encodes them.
pub fn generate_refresh_token<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Opaque, server-side refresh tokens.
///
/// The store itself holds no state; every decision is taken on one read from
/// the repository.
#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    clock: Arc<dyn Clock>,
}

impl RefreshTokenStore {
    pub fn new(repo: Arc<dyn RefreshTokenRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn issue(&self, user_id: Uuid, ttl: Duration) -> AuthResult<String> {
        let token = generate_refresh_token(&mut OsRng);
        let now = self.clock.now();
        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            warn!(user_id = %user_id, ttl = %ttl, "refresh token lifetime out of range");
            AuthError::TokenSigning(format!("lifetime {ttl} out of range"))
        })?;
        self.repo.insert(&token, user_id, expires_at, now).await?;
        debug!(user_id = %user_id, "refresh token issued");
        Ok(token)
    }

    /// Returns the owning user of a live token.
    pub async fn validate(&self, token: &str) -> AuthResult<Uuid> {
        let Some(row) = self.repo.find_by_token(token).await? else {
            warn!("refresh token not found");
            return Err(AuthError::NotFound);
        };
        if row.revoked_at.is_some() {
            warn!(user_id = %row.user_id, "revoked refresh token presented");
            return Err(AuthError::Revoked);
        }
        if self.clock.now() >= row.expires_at {
            warn!(user_id = %row.user_id, "expired refresh token presented");
            return Err(AuthError::Expired);
        }
        Ok(row.user_id)
    }

    /// Idempotent: revoking a revoked token succeeds and keeps the first
    /// revocation time.
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        if !self.repo.mark_revoked(token, self.clock.now()).await? {
            warn!("revoke of unknown refresh token");
            return Err(AuthError::NotFound);
        }
        debug!("refresh token revoked");
        Ok(())
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let n = self.repo.revoke_all_for_user(user_id, self.clock.now()).await?;
        info!(user_id = %user_id, revoked = n, "refresh tokens of user revoked");
        Ok(n)
    }

    /// Deletes every refresh token. The caller decides whether it may.
    pub async fn purge_all(&self) -> AuthResult<u64> {
        let n = self.repo.delete_all().await?;
        info!(deleted = n, "refresh tokens purged");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo::{tests::Unreachable, InMemoryRefreshTokenRepository},
        clock::ManualClock,
    };

    fn store() -> (RefreshTokenStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = RefreshTokenStore::new(
            Arc::new(InMemoryRefreshTokenRepository::new()),
            clock.clone(),
        );
        (store, clock)
    }

    #[test]
    fn generated_tokens_are_64_hex_chars() {
        let a = generate_refresh_token(&mut OsRng);
        let b = generate_refresh_token(&mut OsRng);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn issued_token_validates_to_owner() {
        let (store, _) = store();
        let user = Uuid::new_v4();
        let token = store.issue(user, Duration::days(60)).await.expect("issue");
        assert_eq!(store.validate(&token).await.expect("validate"), user);
        // not rotated: usable again
        assert_eq!(store.validate(&token).await.expect("validate again"), user);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (store, _) = store();
        assert!(matches!(store.validate("deadbeef").await, Err(AuthError::NotFound)));
        assert!(matches!(store.revoke("deadbeef").await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn token_expires_at_ttl() {
        let (store, clock) = store();
        let user = Uuid::new_v4();
        let token = store.issue(user, Duration::hours(1)).await.expect("issue");

        clock.advance(Duration::minutes(59));
        assert_eq!(store.validate(&token).await.expect("valid"), user);

        clock.advance(Duration::minutes(1));
        assert!(matches!(store.validate(&token).await, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (store, _) = store();
        let token = store.issue(Uuid::new_v4(), Duration::days(1)).await.expect("issue");

        store.revoke(&token).await.expect("revoke");
        assert!(matches!(store.validate(&token).await, Err(AuthError::Revoked)));
        store.revoke(&token).await.expect("second revoke is a no-op");
        assert!(matches!(store.validate(&token).await, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn revoked_wins_over_expired() {
        let (store, clock) = store();
        let token = store.issue(Uuid::new_v4(), Duration::minutes(1)).await.expect("issue");
        store.revoke(&token).await.expect("revoke");
        clock.advance(Duration::hours(1));
        assert!(matches!(store.validate(&token).await, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn revoke_all_for_user_and_purge() {
        let (store, _) = store();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let a1 = store.issue(alice, Duration::days(1)).await.expect("issue");
        let a2 = store.issue(alice, Duration::days(1)).await.expect("issue");
        let b1 = store.issue(bob, Duration::days(1)).await.expect("issue");

        assert_eq!(store.revoke_all_for_user(alice).await.expect("revoke all"), 2);
        assert!(matches!(store.validate(&a1).await, Err(AuthError::Revoked)));
        assert!(matches!(store.validate(&a2).await, Err(AuthError::Revoked)));
        assert_eq!(store.validate(&b1).await.expect("bob untouched"), bob);

        assert_eq!(store.purge_all().await.expect("purge"), 3);
        assert!(matches!(store.validate(&b1).await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn out_of_range_lifetime_is_rejected_before_storing() {
        let (store, _) = store();
        let user = Uuid::new_v4();
        let err = store.issue(user, Duration::days(10_000_000)).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenSigning(_)));
        assert!(!err.is_unauthorized());
        assert_eq!(store.revoke_all_for_user(user).await.expect("revoke all"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn revoke_is_visible_to_racing_validations() {
        let (store, _) = store();
        let user = Uuid::new_v4();
        let token = store.issue(user, Duration::days(1)).await.expect("issue");

        let racers: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let token = token.clone();
                tokio::spawn(async move { store.validate(&token).await })
            })
            .collect();
        store.revoke(&token).await.expect("revoke");

        for racer in racers {
            match racer.await.expect("task panicked") {
                Ok(id) => assert_eq!(id, user),
                Err(AuthError::Revoked) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        for _ in 0..8 {
            assert!(matches!(store.validate(&token).await, Err(AuthError::Revoked)));
        }
    }

    #[tokio::test]
    async fn persistence_failures_surface_as_persistence() {
        let store = RefreshTokenStore::new(Arc::new(Unreachable), Arc::new(ManualClock::starting_now()));
        let err = store.validate("x").await.unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
        assert!(!err.is_unauthorized());
        assert!(matches!(
            store.issue(Uuid::new_v4(), Duration::days(1)).await,
            Err(AuthError::Persistence(_))
        ));
    }
}
