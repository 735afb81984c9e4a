//! Outgoing mail. Messages are rendered and written to the log; there is no
//! SMTP transport.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Notifier {
    default_from: String,
    contact_receiver: String,
}

impl Notifier {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            default_from: config.default_from_email.clone(),
            contact_receiver: config.contact_receiver_email.clone(),
        }
    }

    /// Bodies can carry reset links, so they only go out at debug level.
    fn deliver(&self, mail: OutgoingMail) -> OutgoingMail {
        info!(from = %mail.from, to = %mail.to, subject = %mail.subject, "mail queued");
        debug!(to = %mail.to, "mail body:\n{}", mail.body);
        mail
    }

    pub fn password_reset(&self, to: &str, username: &str, link: &str) -> OutgoingMail {
        self.deliver(OutgoingMail {
            from: self.default_from.clone(),
            to: to.to_string(),
            subject: "Password reset".to_string(),
            body: format!("Hi {username},\n\nReset your password here: {link}\n"),
        })
    }

    /// Admin notice plus an acknowledgement to the sender.
    pub fn contact_received(&self, name: &str, email: &str, subject: &str, message: &str) -> [OutgoingMail; 2] {
        let notice = self.deliver(OutgoingMail {
            from: self.default_from.clone(),
            to: self.contact_receiver.clone(),
            subject: format!("New Contact Form Submission: {subject}"),
            body: format!("Name: {name}\nEmail: {email}\nSubject: {subject}\n\nMessage:\n{message}\n"),
        });
        let ack = self.deliver(OutgoingMail {
            from: self.default_from.clone(),
            to: email.to_string(),
            subject: "Thank you for contacting us".to_string(),
            body: format!(
                "Dear {name},\n\nThank you for reaching out. We have received your message about \"{subject}\" and will get back to you soon.\n"
            ),
        });
        [notice, ack]
    }
}
