// service/conversation_service.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::CoreError;
use crate::models::messagemodel::{Conversation, Message};
use crate::repo::messagerepo::MessageRepo;
use crate::repo::StoreHandle;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum InboxState {
    Live(Vec<Conversation>),
    ConnectionLost,
}

#[derive(Debug)]
enum Command {
    MarkRead(String),
    MarkAllRead,
}

/// Folds the user's sent and received message snapshots into one inbox.
///
/// Pure so the merge/dedupe/pick-latest step is testable without a runtime:
/// merge both snapshots, dedupe by message id (either feed may redeliver),
/// group by counterparty, and keep the message with the greatest
/// (timestamp, id) per group. The id tie-break is arbitrary but
/// deterministic, so both sides of a tie agree. The result replaces any
/// prior list wholesale, newest conversation first.
///
/// A message counts as unread when it is addressed to `user_id` and its
/// timestamp is strictly newer than the mark-read checkpoint for that
/// counterparty. No checkpoint means everything received is unread.
fn fold_conversations(
    user_id: &str,
    sent: &[Message],
    received: &[Message],
    checkpoints: &HashMap<String, DateTime<Utc>>,
) -> Vec<Conversation> {
    let mut by_id: HashMap<&str, &Message> = HashMap::new();
    for message in sent.iter().chain(received.iter()) {
        by_id.entry(message.id.as_str()).or_insert(message);
    }

    let mut groups: HashMap<&str, Vec<&Message>> = HashMap::new();
    for message in by_id.values() {
        let (counterparty, _) = message.counterparty_of(user_id);
        groups.entry(counterparty).or_default().push(*message);
    }

    let mut conversations: Vec<Conversation> = Vec::with_capacity(groups.len());
    for (counterparty, messages) in groups {
        let Some(last) = messages
            .iter()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
        else {
            continue;
        };
        let checkpoint = checkpoints.get(counterparty);
        let unread_count = messages
            .iter()
            .filter(|m| {
                m.receiver_id == user_id && checkpoint.map_or(true, |c| m.timestamp > *c)
            })
            .count();
        let (_, contact) = last.counterparty_of(user_id);
        conversations.push(Conversation {
            counterparty_id: counterparty.to_string(),
            counterparty_contact: contact.to_string(),
            last_message: (*last).clone(),
            unread_count,
        });
    }

    conversations.sort_by(|a, b| {
        b.last_timestamp()
            .cmp(&a.last_timestamp())
            .then_with(|| a.counterparty_id.cmp(&b.counterparty_id))
    });
    conversations
}

/// Live inbox for one session. Owns its two subscriptions and all derived
/// state; nothing here is shared across users or sessions. `dispose` (or
/// drop) tears the fan-in down and is safe to call any number of times.
pub struct ConversationAggregator {
    state: watch::Receiver<InboxState>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl ConversationAggregator {
    /// Opens the sent and received feeds for the session user and starts
    /// the reducer. Fails fast if the store will not hand out subscriptions.
    pub async fn spawn(store: StoreHandle, session: Session) -> Result<Self, CoreError> {
        let mut sent_feed = store.subscribe_sent(&session.user_id).await?;
        let mut received_feed = store.subscribe_received(&session.user_id).await?;

        let (state_tx, state_rx) = watch::channel(InboxState::Live(Vec::new()));
        let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);

        let task = tokio::spawn(async move {
            let user_id = session.user_id;
            let mut sent: Vec<Message> = Vec::new();
            let mut received: Vec<Message> = Vec::new();
            let mut checkpoints: HashMap<String, DateTime<Utc>> = HashMap::new();

            loop {
                // No ordering holds across the two feeds, so any event from
                // either side triggers a full re-fold.
                tokio::select! {
                    batch = sent_feed.recv() => match batch {
                        Some(docs) => sent = docs.iter().map(Message::from_document).collect(),
                        None => {
                            tracing::warn!(user_id = %user_id, "sent-message feed closed");
                            let _ = state_tx.send(InboxState::ConnectionLost);
                            break;
                        }
                    },
                    batch = received_feed.recv() => match batch {
                        Some(docs) => received = docs.iter().map(Message::from_document).collect(),
                        None => {
                            tracing::warn!(user_id = %user_id, "received-message feed closed");
                            let _ = state_tx.send(InboxState::ConnectionLost);
                            break;
                        }
                    },
                    command = command_rx.recv() => match command {
                        Some(Command::MarkRead(peer_id)) => {
                            // Checkpoint at the newest message seen from this
                            // peer; anything arriving later counts again.
                            let latest = received
                                .iter()
                                .filter(|m| m.sender_id == peer_id)
                                .map(|m| m.timestamp)
                                .max();
                            if let Some(ts) = latest {
                                checkpoints.insert(peer_id, ts);
                            }
                        }
                        Some(Command::MarkAllRead) => {
                            let mut latest_by_peer: HashMap<String, DateTime<Utc>> = HashMap::new();
                            for m in &received {
                                let entry = latest_by_peer
                                    .entry(m.sender_id.clone())
                                    .or_insert(m.timestamp);
                                if m.timestamp > *entry {
                                    *entry = m.timestamp;
                                }
                            }
                            checkpoints.extend(latest_by_peer);
                        }
                        None => break, // aggregator disposed
                    },
                }
                let inbox = fold_conversations(&user_id, &sent, &received, &checkpoints);
                if state_tx.send(InboxState::Live(inbox)).is_err() {
                    break;
                }
            }
        });

        Ok(ConversationAggregator {
            state: state_rx,
            commands: command_tx,
            task,
        })
    }

    pub fn watch(&self) -> watch::Receiver<InboxState> {
        self.state.clone()
    }

    /// Advance the read checkpoint for one counterparty. Explicit only; no
    /// fetch ever moves it.
    pub async fn mark_read(&self, peer_id: &str) {
        let _ = self
            .commands
            .send(Command::MarkRead(peer_id.to_string()))
            .await;
    }

    pub async fn mark_all_read(&self) {
        let _ = self.commands.send(Command::MarkAllRead).await;
    }

    pub fn dispose(&self) {
        self.task.abort();
    }
}

impl Drop for ConversationAggregator {
    fn drop(&mut self) {
        self.dispose();
    }
}
