// dtos/messagedtos.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::messagemodel::{Bid, MessageType};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageDto {
    #[validate(length(min = 1, message = "Receiver is required"))]
    pub receiver_id: String,

    pub receiver_contact: String,

    #[validate(length(min = 1, max = 2000, message = "Message must not be empty"))]
    pub content: String,

    pub job_id: Option<String>,

    pub bid: Option<Bid>,

    #[serde(default)]
    pub message_type: MessageType,
}

impl SendMessageDto {
    /// Plain text message, the overwhelmingly common case.
    pub fn text(receiver_id: &str, receiver_contact: &str, content: &str) -> Self {
        SendMessageDto {
            receiver_id: receiver_id.to_string(),
            receiver_contact: receiver_contact.to_string(),
            content: content.to_string(),
            job_id: None,
            bid: None,
            message_type: MessageType::Text,
        }
    }
}
