use std::{collections::HashMap, sync::Mutex};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::RefreshTokenRow;

/// Persistence collaborator for refresh tokens.
///
/// Each method is a single atomic statement against the backing store, so a
/// committed revoke is visible to every later lookup.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()>;

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<RefreshTokenRow>>;

    /// Sets `revoked_at` if unset. Returns false when no such token exists.
    async fn mark_revoked(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<bool>;

    /// Revokes every live token of `user_id`, returning how many changed.
    async fn revoke_all_for_user(&self, user_id: Uuid, now: OffsetDateTime)
        -> anyhow::Result<u64>;

    async fn delete_all(&self) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    db: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, created_at, updated_at, user_id, expires_at, revoked_at)
            VALUES ($1, $2, $2, $3, $4, NULL)
            "#,
        )
        .bind(token)
        .bind(now)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert refresh token")?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<RefreshTokenRow>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token, user_id, created_at, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("get refresh token")?;
        Ok(row)
    }

    async fn mark_revoked(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE refresh_tokens
               SET revoked_at = COALESCE(revoked_at, $2),
                   updated_at = $2
             WHERE token = $1
            "#,
        )
        .bind(token)
        .bind(now)
        .execute(&self.db)
        .await
        .context("revoke refresh token")?;
        Ok(res.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE refresh_tokens
               SET revoked_at = $2,
                   updated_at = $2
             WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.db)
        .await
        .context("revoke refresh tokens of user")?;
        Ok(res.rows_affected())
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM refresh_tokens")
            .execute(&self.db)
            .await
            .context("delete refresh tokens")?;
        Ok(res.rows_affected())
    }
}

/// Process-local repository behind a mutex.
#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    rows: Mutex<HashMap<String, RefreshTokenRow>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, RefreshTokenRow>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow::anyhow!("refresh token map poisoned"))
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn insert(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let mut rows = self.rows()?;
        if rows.contains_key(token) {
            anyhow::bail!("duplicate refresh token");
        }
        rows.insert(
            token.to_string(),
            RefreshTokenRow {
                token: token.to_string(),
                user_id,
                created_at: now,
                expires_at,
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<RefreshTokenRow>> {
        Ok(self.rows()?.get(token).cloned())
    }

    async fn mark_revoked(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<bool> {
        let mut rows = self.rows()?;
        match rows.get_mut(token) {
            Some(row) => {
                row.revoked_at.get_or_insert(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let mut rows = self.rows()?;
        let mut changed = 0;
        for row in rows
            .values_mut()
            .filter(|r| r.user_id == user_id && r.revoked_at.is_none())
        {
            row.revoked_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        let mut rows = self.rows()?;
        let n = rows.len() as u64;
        rows.clear();
        Ok(n)
    }
}
