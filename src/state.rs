use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    auth::{
        jwt::AccessTokens,
        password::CredentialHasher,
        refresh::RefreshTokenStore,
        repo::{InMemoryRefreshTokenRepository, PgRefreshTokenRepository, RefreshTokenRepository},
        services::SessionService,
    },
    clock::{Clock, SystemClock},
    config::AppConfig,
    metrics::HitCounter,
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub sessions: SessionService,
    pub hits: Arc<HitCounter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        let repo = Arc::new(PgRefreshTokenRepository::new(db.clone()));
        Ok(Self::from_parts(
            db,
            config,
            CredentialHasher::default(),
            repo,
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        db: PgPool,
        config: AppConfig,
        hasher: CredentialHasher,
        refresh_repo: Arc<dyn RefreshTokenRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionService {
            hasher,
            access_tokens: AccessTokens::new(&config.jwt.secret, clock.clone()),
            refresh_tokens: RefreshTokenStore::new(refresh_repo, clock),
            access_ttl: config.jwt.access_ttl(),
            refresh_ttl: config.jwt.refresh_ttl(),
        };
        Self {
            db,
            config: Arc::new(config),
            sessions,
            hits: Arc::new(HitCounter::new()),
        }
    }

    /// State whose pool never connects until used and whose refresh tokens
    /// live in memory. For exercising routes that do not touch users/chirps.
    pub fn fake(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .context("lazy pool")?;
        Ok(Self::from_parts(
            db,
            config,
            CredentialHasher::default(),
            Arc::new(InMemoryRefreshTokenRepository::new()),
            Arc::new(SystemClock),
        ))
    }
}

impl FromRef<AppState> for AccessTokens {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.access_tokens.clone()
    }
}
