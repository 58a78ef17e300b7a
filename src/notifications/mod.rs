//! Outbound email and SMS.
//!
//! Handlers talk to a [`Notifier`] so the delivery mechanism can be swapped
//! (tests install a recorder). [`Dispatcher`] is the production notifier built
//! from the SMTP and SMS gateway settings.

pub mod email;
pub mod sms;
pub mod templates;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;

use self::email::SystemEmailService;
use self::sms::SmsGateway;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, text: &str, html: &str) -> Result<()>;

    async fn send_sms(&self, to: &str, body: &str) -> Result<()>;
}

pub struct Dispatcher {
    email: SystemEmailService,
    sms: SmsGateway,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        Self {
            email: SystemEmailService::new(config.email.clone()),
            sms: SmsGateway::new(config.sms.clone()),
        }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn send_email(&self, to: &str, subject: &str, text: &str, html: &str) -> Result<()> {
        self.email.send(to, subject, text, html).await
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        self.sms.send(to, body).await
    }
}

/// Send an email where delivery is a courtesy: failures are logged, not returned
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    to: &str,
    content: templates::EmailContent,
) {
    if let Err(e) = notifier
        .send_email(to, &content.subject, &content.text, &content.html)
        .await
    {
        tracing::warn!(to = %to, subject = %content.subject, error = %e, "Failed to send notification email");
    }
}
