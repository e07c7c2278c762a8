//! Outbound mail. Confirmation links are the only messages the server sends.

use std::borrow::Cow;
use std::fmt::Debug;
use tracing::info;

#[vain_derive::vain_error]
pub enum MailError {
    #[error("Mail delivery failed{}: {message}", format_context(.context))]
    Delivery { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Delivers one plain-text message.
pub trait Mailer: Send + Sync + Debug {
    /// # Errors
    ///
    /// Returns [`MailError::Delivery`] when the message could not be handed off.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Writes messages to the `vaind::mail` log target instead of a mail transport.
///
/// This is a development delivery channel: the operator reads confirmation links from
/// the log, so the body is logged verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(target: "vaind::mail", %to, %subject, %body, "Mail queued");
        Ok(())
    }
}
