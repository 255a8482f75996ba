// service/message_service.rs
use std::collections::HashSet;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::dtos::messagedtos::SendMessageDto;
use crate::error::CoreError;
use crate::models::messagemodel::Message;
use crate::repo::messagerepo::MessageRepo;
use crate::repo::StoreHandle;
use crate::session::Session;
use crate::store::Document;

/// What a live message view currently shows. `ConnectionLost` is distinct
/// from an empty thread: an errored feed stays lost until the caller opens
/// a fresh one, there is no hidden retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    Live(Vec<Message>),
    ConnectionLost,
}

/// Live view over one two-party thread. Dropping the feed (or calling
/// `dispose`, which is idempotent) cancels the underlying subscription so a
/// closed screen stops consuming events.
pub struct MessageFeed {
    state: watch::Receiver<FeedState>,
    task: JoinHandle<()>,
}

impl MessageFeed {
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    pub fn dispose(&self) {
        self.task.abort();
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The snapshot fold for a thread: dedupe by id (the feed may redeliver
/// unchanged documents), then sort ascending by timestamp with id as the
/// deterministic tie-break.
fn reduce_thread(docs: &[Document]) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut messages: Vec<Message> = docs
        .iter()
        .map(Message::from_document)
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    messages
}

#[derive(Debug, Clone)]
pub struct MessageService {
    store: StoreHandle,
}

impl MessageService {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Appends to the message log and returns the acknowledged message.
    /// Callers keep their compose buffer until this returns Ok; on Err
    /// nothing was written and the text is still theirs to retry.
    pub async fn send_message(
        &self,
        session: &Session,
        dto: SendMessageDto,
    ) -> Result<Message, CoreError> {
        dto.validate()?;
        let message = self.store.append_message(session, &dto).await?;
        tracing::debug!(
            message_id = %message.id,
            receiver_id = %message.receiver_id,
            kind = message.message_type.as_str(),
            "message appended"
        );
        Ok(message)
    }

    /// Opens the live thread between the session user and `peer_id`. Each
    /// store snapshot replaces the list wholesale; if the subscription dies
    /// the feed flips to `ConnectionLost` and stays there.
    pub async fn open_thread(
        &self,
        session: &Session,
        peer_id: &str,
    ) -> Result<MessageFeed, CoreError> {
        let mut subscription = self
            .store
            .subscribe_thread(&session.user_id, peer_id)
            .await?;
        let (state_tx, state_rx) = watch::channel(FeedState::Live(Vec::new()));

        let task = tokio::spawn(async move {
            loop {
                match subscription.recv().await {
                    Some(docs) => {
                        if state_tx.send(FeedState::Live(reduce_thread(&docs))).is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::warn!("thread subscription closed by the store");
                        let _ = state_tx.send(FeedState::ConnectionLost);
                        break;
                    }
                }
            }
        });

        Ok(MessageFeed {
            state: state_rx,
            task,
        })
    }
}
