use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Chirp;

impl Chirp {
    pub async fn create(db: &PgPool, user_id: Uuid, body: &str) -> anyhow::Result<Chirp> {
        let chirp = sqlx::query_as::<_, Chirp>(
            r#"
            INSERT INTO chirps (id, created_at, updated_at, body, user_id)
            VALUES ($1, NOW(), NOW(), $2, $3)
            RETURNING id, created_at, updated_at, body, user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(body)
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("create chirp")?;
        Ok(chirp)
    }

    /// Oldest first, optionally only one author's.
    pub async fn list(db: &PgPool, author_id: Option<Uuid>) -> anyhow::Result<Vec<Chirp>> {
        let rows = sqlx::query_as::<_, Chirp>(
            r#"
            SELECT id, created_at, updated_at, body, user_id
            FROM chirps
            WHERE $1::uuid IS NULL OR user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(author_id)
        .fetch_all(db)
        .await
        .context("list chirps")?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Chirp>> {
        let row = sqlx::query_as::<_, Chirp>(
            r#"
            SELECT id, created_at, updated_at, body, user_id
            FROM chirps
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get chirp")?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM chirps WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete chirp")?;
        Ok(res.rows_affected() > 0)
    }
}
