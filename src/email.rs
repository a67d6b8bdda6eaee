use anyhow::{Context, Result};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, Message},
    transport::smtp::authentication::Credentials,
};
use std::time::Duration;

pub struct SmtpSettings<'a> {
    pub host: &'a str,
    pub username: &'a str,
    pub app_password: &'a str,
}

pub async fn send_email(smtp: &SmtpSettings<'_>, recipients: &[String], subject: &str, body: &str) -> Result<()> {
    if recipients.is_empty() {
        return Ok(());
    }

    // STARTTLS on 587
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp.host)
        .with_context(|| format!("Invalid SMTP relay {}", smtp.host))?
        .credentials(Credentials::new(
            smtp.username.to_string(),
            smtp.app_password.to_string(),
        ))
        .timeout(Some(Duration::from_secs(20)))
        .build();

    for rcpt in recipients {
        let email = Message::builder()
            .from(smtp.username.parse::<Mailbox>()?)
            .to(rcpt.parse::<Mailbox>().context("Invalid recipient email")?)
            .subject(subject)
            .body(body.to_owned())?;

        mailer.send(email).await?;
    }

    Ok(())
}
