use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::MailConfig;

/// Outbound mail seam for password-reset links.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

/// Hands messages to the log; a real SMTP relay sits outside this service.
#[derive(Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        if cfg.user.is_none() || cfg.password.is_none() {
            warn!("EMAIL_USER / EMAIL_PASSWORD not set; reset mails use the default sender");
        }
        Self {
            from: cfg
                .user
                .clone()
                .unwrap_or_else(|| "no-reply@budgetwise.local".into()),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        info!(from = %self.from, to = %to, "password reset mail queued");
        debug!(to = %to, link = %link, "password reset link");
        Ok(())
    }
}

pub fn reset_link(base: &str, token: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}token={token}")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Keeps every (recipient, link) pair for assertions.
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
            self.sent.lock().await.push((to.to_string(), link.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_appends_token() {
        assert_eq!(
            reset_link("https://localhost:8080/reset-password", "abc"),
            "https://localhost:8080/reset-password?token=abc"
        );
        assert_eq!(
            reset_link("https://x.io/r?lang=en", "abc"),
            "https://x.io/r?lang=en&token=abc"
        );
    }
}
