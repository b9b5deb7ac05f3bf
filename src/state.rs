use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::rate_limit::LoginLimiter;
use crate::categories::repo::{CategoryRepo, PgCategoryRepo};
use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer};
use crate::memory::MemoryStore;
use crate::seed;
use crate::payments::repo::{PaymentRepo, PgPaymentRepo};
use crate::users::repo::{PgUserRepo, UserRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub categories: Arc<dyn CategoryRepo>,
    pub payments: Arc<dyn PaymentRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub login_limiter: LoginLimiter,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let mailer = Arc::new(LogMailer::new(&config.mail)) as Arc<dyn Mailer>;

        let Some(database_url) = config.database_url.clone() else {
            warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
            let state = Self::in_memory(config, mailer);
            if state.config.seed_demo {
                seed::seed_demo(&state).await.context("seed demo data")?;
            }
            return Ok(state);
        };

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("database migrations applied");

        let login_limiter = LoginLimiter::from_config(&config.login_limit);
        Ok(Self {
            users: Arc::new(PgUserRepo { db: db.clone() }),
            categories: Arc::new(PgCategoryRepo { db: db.clone() }),
            payments: Arc::new(PgPaymentRepo { db }),
            mailer,
            login_limiter,
            config,
        })
    }

    pub fn in_memory(config: Arc<AppConfig>, mailer: Arc<dyn Mailer>) -> Self {
        let store = MemoryStore::new();
        let login_limiter = LoginLimiter::from_config(&config.login_limit);
        Self {
            users: Arc::new(store.clone()),
            categories: Arc::new(store.clone()),
            payments: Arc::new(store),
            mailer,
            login_limiter,
            config,
        }
    }
}
