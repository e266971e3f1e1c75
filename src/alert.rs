//! Email alerting
//!
//! SMTP delivery of monitoring alerts. Sending is fire-and-forget at the
//! call sites: a failed send is logged, never propagated.

use crate::config::SmtpSettings;
use crate::error::{PipelineError, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Send a plain-text alert over SMTP (STARTTLS)
pub fn send_alert(smtp: &SmtpSettings, subject: &str, body: &str) -> Result<()> {
    let message = Message::builder()
        .from(parse_mailbox(&smtp.from)?)
        .to(parse_mailbox(&smtp.recipient)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| PipelineError::MailError(format!("failed to build message: {e}")))?;

    let transport = SmtpTransport::starttls_relay(&smtp.host)
        .map_err(|e| PipelineError::MailError(format!("bad SMTP relay '{}': {e}", smtp.host)))?
        .credentials(Credentials::new(
            smtp.username.clone(),
            smtp.password.clone(),
        ))
        .build();

    transport
        .send(&message)
        .map_err(|e| PipelineError::MailError(format!("send failed: {e}")))?;

    log::info!("alert email sent to {}", smtp.recipient);
    Ok(())
}

/// Fire-and-forget variant; logs when alerting is disabled or fails
pub fn try_send_alert(smtp: Option<&SmtpSettings>, subject: &str, body: &str) {
    match smtp {
        Some(smtp) => {
            if let Err(e) = send_alert(smtp, subject, body) {
                log::warn!("alert email failed: {e}");
            }
        }
        None => log::warn!("alerting disabled (no SMTP settings); dropped alert: {subject}"),
    }
}

fn parse_mailbox(address: &str) -> Result<lettre::message::Mailbox> {
    address
        .parse()
        .map_err(|e| PipelineError::MailError(format!("bad address '{address}': {e}")))
}
