//! Transactional email: magic links and welcome messages.
//!
//! Messages are rendered from Askama templates (HTML + plain text) and handed
//! to a [`Mailer`]. [`SmtpMailer`] delivers over SMTP via lettre;
//! [`LogMailer`] writes the message to the log for local development.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use sharerides_core::Email;

use crate::config::SmtpConfig;

/// HTML template for the sign-in link email.
#[derive(Template)]
#[template(path = "email/sign_in.html")]
struct SignInEmailHtml<'a> {
    email: &'a str,
    url: &'a str,
}

/// Plain text template for the sign-in link email.
#[derive(Template)]
#[template(path = "email/sign_in.txt")]
struct SignInEmailText<'a> {
    email: &'a str,
    url: &'a str,
}

/// HTML template for the sign-up link email.
#[derive(Template)]
#[template(path = "email/sign_up.html")]
struct SignUpEmailHtml<'a> {
    email: &'a str,
    url: &'a str,
}

/// Plain text template for the sign-up link email.
#[derive(Template)]
#[template(path = "email/sign_up.txt")]
struct SignUpEmailText<'a> {
    email: &'a str,
    url: &'a str,
}

/// HTML template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    site_url: &'a str,
}

/// Plain text template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    site_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: Email,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Delivers rendered messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, from: &str, email: &RenderedEmail) -> Result<(), MailError>;
}

/// SMTP delivery with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, from: &str, email: &RenderedEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                from.parse()
                    .map_err(|_| MailError::InvalidAddress(from.to_owned()))?,
            )
            .to(email
                .to
                .as_str()
                .parse()
                .map_err(|_| MailError::InvalidAddress(email.to.to_string()))?)
            .subject(email.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, from: &str, email: &RenderedEmail) -> Result<(), MailError> {
        tracing::info!(
            from = %from,
            to = %email.to,
            subject = %email.subject,
            body = %email.text,
            "Email not sent (log transport)"
        );
        Ok(())
    }
}

/// Keeps every message in memory instead of sending it.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<RenderedEmail>>,
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(&self, _from: &str, email: &RenderedEmail) -> Result<(), MailError> {
        self.messages().push(email.clone());
        Ok(())
    }
}

#[cfg(any(test, feature = "testing"))]
impl RecordingMailer {
    fn messages(&self) -> std::sync::MutexGuard<'_, Vec<RenderedEmail>> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Every message delivered so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<RenderedEmail> {
        self.messages().clone()
    }

    /// The sign-in link in the newest message that carries one.
    #[must_use]
    pub fn last_link(&self) -> Option<String> {
        self.find_link(|_| true)
    }

    /// The sign-in link most recently mailed to `to`.
    #[must_use]
    pub fn last_link_for(&self, to: &str) -> Option<String> {
        self.find_link(|m| m.to.as_str() == to)
    }

    fn find_link(&self, wanted: impl Fn(&RenderedEmail) -> bool) -> Option<String> {
        self.messages()
            .iter()
            .rev()
            .filter(|m| wanted(m))
            .flat_map(|m| m.text.split_whitespace())
            .find(|word| word.contains("/auth/callback?"))
            .map(str::to_owned)
    }
}

/// Renders and sends the site's transactional emails.
pub struct EmailService {
    mailer: std::sync::Arc<dyn Mailer>,
    from_address: String,
    site_url: String,
}

impl EmailService {
    /// Create a new email service.
    #[must_use]
    pub fn new(
        mailer: std::sync::Arc<dyn Mailer>,
        from_address: impl Into<String>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            from_address: from_address.into(),
            site_url: site_url.into(),
        }
    }

    /// Send a magic link. First-time addresses get the sign-up wording.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or delivery fails.
    pub async fn send_magic_link(
        &self,
        to: &Email,
        url: &str,
        is_new_user: bool,
    ) -> Result<(), MailError> {
        let email = to.as_str();
        let message = if is_new_user {
            RenderedEmail {
                to: to.clone(),
                subject: "Welcome to ShareRideStories! Complete your sign-up".to_owned(),
                text: SignUpEmailText { email, url }.render()?,
                html: SignUpEmailHtml { email, url }.render()?,
            }
        } else {
            RenderedEmail {
                to: to.clone(),
                subject: "Sign in to ShareRideStories".to_owned(),
                text: SignInEmailText { email, url }.render()?,
                html: SignInEmailHtml { email, url }.render()?,
            }
        };

        self.send(&message).await
    }

    /// Send the welcome email after a first sign-in.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or delivery fails.
    pub async fn send_welcome(&self, to: &Email) -> Result<(), MailError> {
        let site_url = self.site_url.as_str();
        let message = RenderedEmail {
            to: to.clone(),
            subject: "Welcome to ShareRideStories".to_owned(),
            text: WelcomeEmailText { site_url }.render()?,
            html: WelcomeEmailHtml { site_url }.render()?,
        };

        self.send(&message).await
    }

    async fn send(&self, message: &RenderedEmail) -> Result<(), MailError> {
        self.mailer.deliver(&self.from_address, message).await?;
        tracing::info!(to = %message.to, subject = %message.subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn service(recorder: &Arc<RecordingMailer>) -> EmailService {
        EmailService::new(
            Arc::clone(recorder) as Arc<dyn Mailer>,
            "ShareRideStories <noreply@shareridestories.com>",
            "https://shareridestories.com",
        )
    }

    #[tokio::test]
    async fn test_new_user_gets_sign_up_email() {
        let recorder = Arc::new(RecordingMailer::default());
        let to = Email::parse("new@example.com").unwrap();
        let url = "https://shareridestories.com/auth/callback?token=abc&email=new%40example.com";

        service(&recorder).send_magic_link(&to, url, true).await.unwrap();

        let sent = recorder.sent();
        let message = sent.first().unwrap();
        assert!(message.subject.contains("Complete your sign-up"));
        assert!(message.text.contains(url));
        assert!(message.html.contains("Complete Sign Up"));
    }

    #[tokio::test]
    async fn test_existing_user_gets_sign_in_email() {
        let recorder = Arc::new(RecordingMailer::default());
        let to = Email::parse("old@example.com").unwrap();

        service(&recorder)
            .send_magic_link(&to, "https://shareridestories.com/auth/callback?token=x", false)
            .await
            .unwrap();

        let sent = recorder.sent();
        assert_eq!(sent.first().unwrap().subject, "Sign in to ShareRideStories");
    }

    #[tokio::test]
    async fn test_welcome_links_to_site() {
        let recorder = Arc::new(RecordingMailer::default());
        let to = Email::parse("new@example.com").unwrap();

        service(&recorder).send_welcome(&to).await.unwrap();

        let sent = recorder.sent();
        assert!(sent.first().unwrap().text.contains("https://shareridestories.com"));
        assert_eq!(recorder.last_link(), None);
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let message = RenderedEmail {
            to: Email::parse("dev@example.com").unwrap(),
            subject: "s".to_owned(),
            text: "t".to_owned(),
            html: "h".to_owned(),
        };
        assert!(LogMailer.deliver("noreply@example.com", &message).await.is_ok());
    }
}
