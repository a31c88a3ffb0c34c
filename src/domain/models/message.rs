use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    Email,
    Sms,
}

impl MessageClass {
    pub const ALL: [MessageClass; 2] = [MessageClass::Email, MessageClass::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageClass::Email => "email",
            MessageClass::Sms => "sms",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "email" => Some(MessageClass::Email),
            "sms" => Some(MessageClass::Sms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageStatus {
    Queued,
    Sent,
    Failed { reason: String },
}

impl MessageStatus {
    /// Terminal records never transition again; the first outcome wins.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed { .. })
    }
}

/// Class-discriminated request payload, validated at construction so the
/// pipeline only ever carries well-formed messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum MessagePayload {
    Email {
        recipient: String,
        subject: String,
        body: String,
    },
    Sms {
        recipient: String,
        sender: String,
        body: String,
    },
}

impl MessagePayload {
    pub fn class(&self) -> MessageClass {
        match self {
            MessagePayload::Email { .. } => MessageClass::Email,
            MessagePayload::Sms { .. } => MessageClass::Sms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            MessagePayload::Email {
                recipient, body, ..
            } => {
                if !recipient.contains('@') {
                    return Err(ValidationError::new("recipient is not an email address"));
                }
                if body.is_empty() {
                    return Err(ValidationError::new("body must not be empty"));
                }
            }
            MessagePayload::Sms {
                recipient,
                sender,
                body,
            } => {
                if recipient.is_empty() {
                    return Err(ValidationError::new("recipient must not be empty"));
                }
                if sender.is_empty() {
                    return Err(ValidationError::new("sms requires a sender id"));
                }
                if body.is_empty() {
                    return Err(ValidationError::new("body must not be empty"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub class: MessageClass,
    pub tenant_id: Uuid,
    pub recipient: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub status: MessageStatus,
    pub attempts: u32,
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(tenant_id: Uuid, payload: MessagePayload) -> Self {
        let now = Utc::now();
        let class = payload.class();
        let (recipient, sender, subject, body) = match payload {
            MessagePayload::Email {
                recipient,
                subject,
                body,
            } => (recipient, None, Some(subject), body),
            MessagePayload::Sms {
                recipient,
                sender,
                body,
            } => (recipient, Some(sender), None, body),
        };
        Self {
            id: Uuid::new_v4(),
            class,
            tenant_id,
            recipient,
            sender,
            subject,
            body,
            status: MessageStatus::Queued,
            attempts: 0,
            provider_ref: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_payload_requires_addressable_recipient() {
        let payload = MessagePayload::Email {
            recipient: "not-an-address".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn sms_payload_requires_sender() {
        let payload = MessagePayload::Sms {
            recipient: "+15551234567".to_string(),
            sender: String::new(),
            body: "ping".to_string(),
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn new_message_starts_queued_with_zero_attempts() {
        let payload = MessagePayload::Email {
            recipient: "a@b.test".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        };
        payload.validate().unwrap();
        let message = Message::new(Uuid::new_v4(), payload);
        assert_eq!(message.status, MessageStatus::Queued);
        assert_eq!(message.attempts, 0);
        assert!(message.provider_ref.is_none());
        assert_eq!(message.class, MessageClass::Email);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!MessageStatus::Queued.is_terminal());
        assert!(MessageStatus::Sent.is_terminal());
        assert!(
            MessageStatus::Failed {
                reason: "x".to_string()
            }
            .is_terminal()
        );
    }
}
