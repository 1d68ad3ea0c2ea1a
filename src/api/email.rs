//! Email delivery abstraction for verification codes.
//!
//! Delivery happens inside the request that issues the code: the OTP row and
//! the send share one transaction commit decision, so a failed send leaves no
//! orphaned code behind. The `EmailSender` trait hides the transport; the
//! default for local development is `LogEmailSender`, which logs the payload
//! and reports success.

use anyhow::Result;
use tracing::info;

/// A rendered verification-code message.
#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub display_name: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Verification-code template used by registration and resend.
    #[must_use]
    pub fn otp(to_email: &str, display_name: &str, code: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            display_name: display_name.to_string(),
            subject: "Your verification code".to_string(),
            body: format!(
                "Hello {display_name},\n\n\
                 Your verification code is {code}. It expires in 10 minutes.\n\n\
                 If you did not request this code, you can ignore this message."
            ),
        }
    }
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can roll back
    /// whatever the message was announcing.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_template_includes_code_and_name() {
        let message = EmailMessage::otp("owner@example.com", "Budi", "042517");
        assert_eq!(message.to_email, "owner@example.com");
        assert!(message.body.contains("042517"));
        assert!(message.body.contains("Budi"));
    }

    #[test]
    fn log_sender_accepts_messages() {
        let sender = LogEmailSender;
        let message = EmailMessage::otp("owner@example.com", "Budi", "042517");
        assert!(sender.send(&message).is_ok());
    }
}
