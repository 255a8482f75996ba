// models/messagemodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Bid,
    AcceptedBid,
    RejectedBid,
}

impl MessageType {
    pub fn parse(raw: &str) -> (MessageType, bool) {
        match raw {
            "TEXT" => (MessageType::Text, true),
            "BID" => (MessageType::Bid, true),
            "ACCEPTED_BID" => (MessageType::AcceptedBid, true),
            "REJECTED_BID" => (MessageType::RejectedBid, true),
            _ => (MessageType::Text, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::Bid => "BID",
            MessageType::AcceptedBid => "ACCEPTED_BID",
            MessageType::RejectedBid => "REJECTED_BID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

impl BidStatus {
    pub fn parse(raw: &str) -> (BidStatus, bool) {
        match raw {
            "PENDING" => (BidStatus::Pending, true),
            "ACCEPTED" => (BidStatus::Accepted, true),
            "REJECTED" => (BidStatus::Rejected, true),
            _ => (BidStatus::Pending, false),
        }
    }
}

/// A photographer's offer carried inside a BID message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub amount: f64,
    pub proposal: String,
    pub availability: bool,
    pub status: BidStatus,
}

impl Bid {
    fn from_value(value: &Value) -> Bid {
        let (status, _) = BidStatus::parse(
            value
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("PENDING"),
        );
        Bid {
            amount: value.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
            proposal: value
                .get("proposal")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            availability: value
                .get("availability")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            status,
        }
    }
}

/// One entry in the append-only message log. Immutable once written; the
/// timestamp is the store's commit time, never the sender's clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_contact: String,
    pub receiver_id: String,
    pub receiver_contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub job_id: Option<String>,
    pub bid: Option<Bid>,
    pub message_type: MessageType,
}

impl Message {
    pub fn from_document(doc: &Document) -> Message {
        let (message_type, valid) = MessageType::parse(doc.get_str("type").unwrap_or("TEXT"));
        if !valid {
            tracing::warn!(message_id = %doc.id, "unknown message type in store, defaulting to TEXT");
        }
        Message {
            id: doc.id.clone(),
            sender_id: doc.get_str("senderId").unwrap_or_default().to_string(),
            sender_contact: doc.get_str("senderContact").unwrap_or_default().to_string(),
            receiver_id: doc.get_str("receiverId").unwrap_or_default().to_string(),
            receiver_contact: doc
                .get_str("receiverContact")
                .unwrap_or_default()
                .to_string(),
            content: doc.get_str("content").unwrap_or_default().to_string(),
            timestamp: doc
                .get_date("timestamp")
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            job_id: doc.get_str("jobId").map(str::to_string),
            bid: doc.get_field("bid").map(Bid::from_value),
            message_type,
        }
    }

    /// Counterparty of this message from `user_id`'s point of view.
    pub fn counterparty_of<'a>(&'a self, user_id: &str) -> (&'a str, &'a str) {
        if self.sender_id == user_id {
            (&self.receiver_id, &self.receiver_contact)
        } else {
            (&self.sender_id, &self.sender_contact)
        }
    }
}

/// Derived inbox row: the latest exchange with one counterparty. Recomputed
/// in memory from the message log, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub counterparty_id: String,
    pub counterparty_contact: String,
    pub last_message: Message,
    pub unread_count: usize,
}

impl Conversation {
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.last_message.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_degrades_to_text() {
        assert_eq!(MessageType::parse("GIF"), (MessageType::Text, false));
        assert_eq!(
            MessageType::parse("ACCEPTED_BID"),
            (MessageType::AcceptedBid, true)
        );
    }

    #[test]
    fn message_materializes_with_bid_payload() {
        let doc = Document {
            id: "m1".to_string(),
            fields: json!({
                "senderId": "ph1",
                "senderContact": "ph1@example.com",
                "receiverId": "c1",
                "receiverContact": "c1@example.com",
                "content": "I can do it for 300",
                "timestamp": "2025-03-01T10:00:00Z",
                "jobId": "j1",
                "type": "BID",
                "bid": { "amount": 300.0, "proposal": "full day", "status": "PENDING" },
            }),
        };
        let message = Message::from_document(&doc);
        assert_eq!(message.message_type, MessageType::Bid);
        assert_eq!(message.job_id.as_deref(), Some("j1"));
        let bid = message.bid.unwrap();
        assert_eq!(bid.amount, 300.0);
        assert_eq!(bid.status, BidStatus::Pending);
        assert!(bid.availability);
    }

    #[test]
    fn bare_document_materializes_with_defaults() {
        let doc = Document {
            id: "m2".to_string(),
            fields: json!({}),
        };
        let message = Message::from_document(&doc);
        assert_eq!(message.message_type, MessageType::Text);
        assert_eq!(message.timestamp, DateTime::<Utc>::UNIX_EPOCH);
        assert!(message.bid.is_none());
        assert!(message.job_id.is_none());
    }

    #[test]
    fn counterparty_is_direction_independent() {
        let doc = Document {
            id: "m3".to_string(),
            fields: json!({
                "senderId": "a",
                "senderContact": "a@x",
                "receiverId": "b",
                "receiverContact": "b@x",
            }),
        };
        let message = Message::from_document(&doc);
        assert_eq!(message.counterparty_of("a"), ("b", "b@x"));
        assert_eq!(message.counterparty_of("b"), ("a", "a@x"));
    }
}
