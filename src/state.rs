use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{
    jwt::JwtKeys,
    repo::{AccountStore, MemoryAccountStore, PgAccountStore},
};
use crate::config::AppConfig;
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let accounts: Arc<dyn AccountStore> = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                info!("using postgres account store");
                Arc::new(PgAccountStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
                Arc::new(MemoryAccountStore::default())
            }
        };
        Ok(Self::from_parts(accounts, Arc::new(config)))
    }

    pub fn from_parts(accounts: Arc<dyn AccountStore>, config: Arc<AppConfig>) -> Self {
        let jwt = JwtKeys::from_config(&config.jwt);
        Self {
            accounts,
            config,
            jwt,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(Arc::new(MemoryAccountStore::default()), config)
    }
}
