//! Email delivery for notifications on the `email` channel

use crate::config::SmtpConfig;
use anyhow::{anyhow, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP sender built once from configuration
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid from address '{}': {}", config.from, e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    pub async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        let email = build_message(&self.from, to_email, subject, body)?;
        self.mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

fn build_message(from: &Mailbox, to_email: &str, subject: &str, body: &str) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(to_email
            .parse()
            .map_err(|e| anyhow!("Invalid to address: {}", e))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| anyhow!("Failed to build email: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp(host: &str, from: &str) -> SmtpConfig {
        SmtpConfig {
            host: host.to_string(),
            port: 2525,
            username: None,
            password: None,
            from: from.to_string(),
        }
    }

    #[test]
    fn test_rejects_empty_host() {
        assert!(EmailService::new(&smtp("  ", "Photodesk <noreply@example.com>")).is_err());
    }

    #[test]
    fn test_rejects_invalid_from() {
        assert!(EmailService::new(&smtp("smtp.example.com", "not an address")).is_err());
    }

    #[test]
    fn test_build_message() {
        let from: Mailbox = "Photodesk <noreply@example.com>".parse().unwrap();
        assert!(build_message(&from, "ada@example.com", "Hi", "Body").is_ok());
        assert!(build_message(&from, "nope", "Hi", "Body").is_err());
    }
}
