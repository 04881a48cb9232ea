//! Confirmation sender that renders the message and writes it to the log.
//!
//! Mail transport is not wired in; operators read confirmations from the
//! structured log until it is.

use async_trait::async_trait;

use crate::config::EmailConfig;
use crate::domain::foundation::DomainError;
use crate::domain::membership::format_cents;
use crate::ports::{ConfirmationKind, ConfirmationSender, PurchaseConfirmation};

/// Renders purchase confirmations and logs them at `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfirmationSender {
    from: String,
}

impl LoggingConfirmationSender {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            from: config.from_header(),
        }
    }
}

fn subject(confirmation: &PurchaseConfirmation) -> String {
    match confirmation.kind {
        ConfirmationKind::Registration => {
            format!("Welcome! Your {} is active", confirmation.role.display_name())
        }
        ConfirmationKind::Renewal => {
            format!("Your {} has been renewed", confirmation.role.display_name())
        }
    }
}

fn body(confirmation: &PurchaseConfirmation) -> String {
    format!(
        "Hi {},\n\nWe received your payment of ${} {}. Your membership is valid until {}.\n",
        confirmation.name,
        format_cents(confirmation.amount_cents),
        confirmation.currency.to_uppercase(),
        confirmation.membership_expiry.as_datetime().format("%B %-d, %Y"),
    )
}

#[async_trait]
impl ConfirmationSender for LoggingConfirmationSender {
    async fn send(&self, confirmation: PurchaseConfirmation) -> Result<(), DomainError> {
        tracing::info!(
            member_id = %confirmation.member_id,
            to = %confirmation.email,
            from = %self.from,
            subject = %subject(&confirmation),
            body = %body(&confirmation),
            "Purchase confirmation"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{MemberId, Timestamp};
    use crate::domain::membership::{Email, MemberRole};

    fn confirmation(kind: ConfirmationKind) -> PurchaseConfirmation {
        PurchaseConfirmation {
            member_id: MemberId::new(),
            email: Email::parse("jane@example.com").unwrap(),
            name: "Jane".to_string(),
            role: MemberRole::Affiliate,
            kind,
            amount_cents: 2500,
            currency: "usd".to_string(),
            membership_expiry: Timestamp::from_unix_secs(1_767_225_600).unwrap(),
        }
    }

    #[test]
    fn subject_names_role_and_kind() {
        assert_eq!(
            subject(&confirmation(ConfirmationKind::Renewal)),
            "Your Affiliate Member has been renewed"
        );
        assert!(subject(&confirmation(ConfirmationKind::Registration)).starts_with("Welcome!"));
    }

    #[test]
    fn body_formats_amount_and_expiry() {
        let text = body(&confirmation(ConfirmationKind::Registration));
        assert!(text.contains("$25.00 USD"));
        assert!(text.contains("January 1, 2026"));
    }

    #[tokio::test]
    async fn send_never_fails() {
        let sender = LoggingConfirmationSender::new(&EmailConfig::default());
        sender
            .send(confirmation(ConfirmationKind::Renewal))
            .await
            .unwrap();
    }
}
