mod config;
mod dtos;
mod error;
mod models;
mod repo;
mod service;
mod session;
mod store;

use std::sync::Arc;

use chrono::{Duration, Utc};
use config::Config;
use dotenv::dotenv;
use tracing_subscriber::filter::LevelFilter;

use crate::dtos::jobdtos::CreateJobDto;
use crate::dtos::messagedtos::SendMessageDto;
use crate::error::CoreError;
use crate::models::jobmodel::EventType;
use crate::repo::StoreHandle;
use crate::service::conversation_service::{ConversationAggregator, InboxState};
use crate::service::job_service::JobService;
use crate::service::message_service::MessageService;
use crate::session::Session;
use crate::store::memory::MemoryStore;

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub store: StoreHandle,
    pub job_service: JobService,
    pub message_service: MessageService,
}

impl AppState {
    pub fn new(store: StoreHandle, config: Config) -> Self {
        let job_service = JobService::new(store.clone());
        let message_service = MessageService::new(store.clone());
        Self {
            env: config,
            store,
            job_service,
            message_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    dotenv().ok();

    let config = Config::init();
    let store = StoreHandle::new(Arc::new(MemoryStore::new()), &config.store_namespace);
    let state = AppState::new(store, config);

    if let Err(err) = run_demo(&state).await {
        tracing::error!("demo run failed: {err}");
        std::process::exit(1);
    }
}

/// Walks the whole core once: a client posts a job, two photographers race
/// for it, the winner and client exchange messages, and the client's inbox
/// aggregates live.
async fn run_demo(state: &AppState) -> Result<(), CoreError> {
    let client = Session::new(
        state.env.session_user_id.clone(),
        state.env.session_contact.clone(),
    );
    let alice = Session::new("ph-alice", "alice@lensmarket.dev");
    let bob = Session::new("ph-bob", "bob@lensmarket.dev");

    let job = state
        .job_service
        .create_job(
            &client,
            CreateJobDto {
                title: "Wedding photographer needed".to_string(),
                description: "Full-day coverage, two venues".to_string(),
                budget: 800.0,
                location: "Lisbon".to_string(),
                event_date: Utc::now() + Duration::days(30),
                event_type: EventType::Wedding,
                requirements: vec!["second shooter".to_string(), "drone".to_string()],
            },
        )
        .await?;

    // Both photographers try to claim the same open job; the store's
    // conditional write picks exactly one winner.
    let (alice_result, bob_result) = tokio::join!(
        state.job_service.apply_for_job(&job.id, &alice.user_id),
        state.job_service.apply_for_job(&job.id, &bob.user_id),
    );
    let winner = match (&alice_result, &bob_result) {
        (Ok(_), Err(CoreError::JobAlreadyTaken(_))) => &alice,
        (Err(CoreError::JobAlreadyTaken(_)), Ok(_)) => &bob,
        _ => {
            tracing::error!("race did not resolve to one winner and one JobAlreadyTaken");
            return Ok(());
        }
    };
    tracing::info!(winner = %winner.user_id, "job race resolved");

    let inbox = ConversationAggregator::spawn(state.store.clone(), client.clone()).await?;
    let mut inbox_rx = inbox.watch();

    state
        .message_service
        .send_message(
            winner,
            SendMessageDto::text(
                &client.user_id,
                &client.contact,
                "Thanks for the job, when can we talk details?",
            ),
        )
        .await?;
    state
        .message_service
        .send_message(
            &client,
            SendMessageDto::text(&winner.user_id, &winner.contact, "Tomorrow at 10?"),
        )
        .await?;

    state.job_service.confirm_job(&job.id).await?;
    state.job_service.complete_job(&job.id).await?;

    // Wait for the aggregator to fold both messages in.
    loop {
        if let InboxState::Live(conversations) = &*inbox_rx.borrow() {
            if conversations
                .first()
                .is_some_and(|c| c.last_message.content == "Tomorrow at 10?")
            {
                for conversation in conversations {
                    tracing::info!(
                        counterparty = %conversation.counterparty_id,
                        unread = conversation.unread_count,
                        last = %conversation.last_message.content,
                        "conversation"
                    );
                }
                break;
            }
        }
        if inbox_rx.changed().await.is_err() {
            break;
        }
    }

    inbox.mark_read(&winner.user_id).await;
    inbox.dispose();

    let proposals = state.job_service.fetch_proposals(&winner.user_id).await?;
    tracing::info!(count = proposals.len(), "winner's proposal list fetched");
    Ok(())
}
