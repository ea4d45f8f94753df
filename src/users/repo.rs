use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::User;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, created_at, updated_at, email, hashed_password
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    /// Create a new user. Returns `None` when the email is already taken.
    pub async fn create(
        db: &PgPool,
        email: &str,
        hashed_password: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, created_at, updated_at, email, hashed_password)
            VALUES ($1, NOW(), NOW(), $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, created_at, updated_at, email, hashed_password
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_optional(db)
        .await
        .context("create user")?;
        Ok(user)
    }

    /// Replace email and credential hash wholesale. `None` when the user is
    /// gone or the new email belongs to someone else.
    pub async fn update_credentials(
        db: &PgPool,
        id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = $2, hashed_password = $3, updated_at = NOW()
             WHERE id = $1
               AND NOT EXISTS (SELECT 1 FROM users WHERE email = $2 AND id <> $1)
            RETURNING id, created_at, updated_at, email, hashed_password
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(hashed_password)
        .fetch_optional(db)
        .await
        .context("update user credentials")?;
        Ok(user)
    }

    /// Delete every user; chirps and refresh tokens cascade.
    pub async fn delete_all(db: &PgPool) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM users")
            .execute(db)
            .await
            .context("delete users")?;
        Ok(res.rows_affected())
    }
}
