// repo/messagerepo.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::StoreHandle;
use crate::dtos::messagedtos::SendMessageDto;
use crate::models::messagemodel::Message;
use crate::session::Session;
use crate::store::{Filter, StoreError, Subscription};

/// Append-only write plus the three change feeds the messaging layer lives
/// on: received-by-user, sent-by-user, and the two-party thread.
#[async_trait]
pub trait MessageRepo {
    async fn append_message(
        &self,
        sender: &Session,
        dto: &SendMessageDto,
    ) -> Result<Message, StoreError>;

    async fn subscribe_received(&self, user_id: &str) -> Result<Subscription, StoreError>;

    async fn subscribe_sent(&self, user_id: &str) -> Result<Subscription, StoreError>;

    async fn subscribe_thread(
        &self,
        user_id: &str,
        peer_id: &str,
    ) -> Result<Subscription, StoreError>;
}

#[async_trait]
impl MessageRepo for StoreHandle {
    async fn append_message(
        &self,
        sender: &Session,
        dto: &SendMessageDto,
    ) -> Result<Message, StoreError> {
        let mut fields = json!({
            "senderId": sender.user_id,
            "senderContact": sender.contact,
            "receiverId": dto.receiver_id,
            "receiverContact": dto.receiver_contact,
            "content": dto.content,
            "type": dto.message_type.as_str(),
            // Server-timestamp sentinel: the store assigns commit time.
            "timestamp": null,
        });
        if let Some(map) = fields.as_object_mut() {
            if let Some(job_id) = &dto.job_id {
                map.insert("jobId".to_string(), Value::from(job_id.clone()));
            }
            if let Some(bid) = &dto.bid {
                map.insert(
                    "bid".to_string(),
                    serde_json::to_value(bid).unwrap_or(Value::Null),
                );
            }
        }
        let doc = self.client.append(self.messages(), fields).await?;
        Ok(Message::from_document(&doc))
    }

    async fn subscribe_received(&self, user_id: &str) -> Result<Subscription, StoreError> {
        self.client
            .subscribe(self.messages(), Filter::new().eq("receiverId", user_id))
            .await
    }

    async fn subscribe_sent(&self, user_id: &str) -> Result<Subscription, StoreError> {
        self.client
            .subscribe(self.messages(), Filter::new().eq("senderId", user_id))
            .await
    }

    async fn subscribe_thread(
        &self,
        user_id: &str,
        peer_id: &str,
    ) -> Result<Subscription, StoreError> {
        let pair = vec![Value::from(user_id), Value::from(peer_id)];
        self.client
            .subscribe(
                self.messages(),
                Filter::new()
                    .any_of("senderId", pair.clone())
                    .any_of("receiverId", pair),
            )
            .await
    }
}
