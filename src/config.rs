use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    /// Link base the reset token is appended to as `?token=`.
    pub reset_url_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub login_limit: RateLimitConfig,
    pub frontend_origin: String,
    /// Key the login limiter on `X-Forwarded-For` instead of the peer address.
    pub trust_proxy: bool,
    /// Load demo users, categories and payments into the in-memory store.
    pub seed_demo: bool,
}

/// Reads `key`, falling back to `default` when unset; a value that does not parse is an error.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value {v:?}")),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let frontend_origin = std::env::var("FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "https://localhost:8080".into());

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "budgetwise".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "budgetwise-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24)?,
        };
        let mail = MailConfig {
            user: std::env::var("EMAIL_USER").ok(),
            password: std::env::var("EMAIL_PASSWORD").ok(),
            reset_url_base: std::env::var("RESET_URL_BASE")
                .unwrap_or_else(|_| format!("{}/reset-password", frontend_origin)),
        };
        let login_limit = RateLimitConfig {
            max_attempts: env_or("LOGIN_MAX_ATTEMPTS", 5)?,
            window_secs: env_or("LOGIN_WINDOW_SECS", 15 * 60)?,
        };

        Ok(Self {
            database_url,
            jwt,
            mail,
            login_limit,
            frontend_origin,
            trust_proxy: env_or("TRUST_PROXY", false)?,
            seed_demo: env_or("SEED_DEMO", false)?,
        })
    }
}
