use std::sync::Mutex;

/// Account mail produced by the auth flows. Rendering and transport live
/// outside this service; a [`Mailer`] only receives the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub kind: MailKind,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    ConfirmAccount,
    ResetPassword,
    ConfirmEmailChange,
}

impl MailKind {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::ConfirmAccount => "Confirm Your Account",
            Self::ResetPassword => "Reset Your Password",
            Self::ConfirmEmailChange => "Confirm Your Email Address",
        }
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: OutgoingMail);
}

/// Hands messages to the log; the token only shows at debug level.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: OutgoingMail) {
        tracing::info!(to = %mail.to, subject = mail.kind.subject(), "queued account mail");
        tracing::debug!(to = %mail.to, token = %mail.token, "account mail token");
    }
}

/// Keeps every message in memory, for tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent message of `kind` sent to `to`.
    pub fn last_to(&self, to: &str, kind: MailKind) -> Option<OutgoingMail> {
        let outbox = self.outbox.lock().ok()?;
        outbox
            .iter()
            .rev()
            .find(|mail| mail.to == to && mail.kind == kind)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.outbox.lock().map(|outbox| outbox.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: OutgoingMail) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(mail);
        }
    }
}
