use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Refresh token record in the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RefreshTokenRow {
    pub token: String,                      // raw hex value, itself high-entropy
    pub user_id: Uuid,                      // owning user
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>, // set once, never cleared
}
