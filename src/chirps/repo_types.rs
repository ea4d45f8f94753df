use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Chirp record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Chirp {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub body: String,
    pub user_id: Uuid, // owner
}
