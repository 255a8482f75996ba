// service/job_service.rs
use tokio::sync::watch;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::dtos::jobdtos::CreateJobDto;
use crate::error::CoreError;
use crate::models::jobmodel::{JobPosting, JobStatus};
use crate::models::proposalmodel::{Proposal, ProposalStatus, ProposalView};
use crate::repo::jobrepo::JobRepo;
use crate::repo::proposalrepo::ProposalRepo;
use crate::repo::StoreHandle;
use crate::session::Session;

/// What the live job board currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum JobFeedState {
    Live(Vec<JobPosting>),
    ConnectionLost,
}

/// Live list of open jobs. Dropping the feed (or calling `dispose`, which
/// is idempotent) cancels the underlying subscription.
pub struct JobFeed {
    state: watch::Receiver<JobFeedState>,
    task: JoinHandle<()>,
}

impl JobFeed {
    pub fn watch(&self) -> watch::Receiver<JobFeedState> {
        self.state.clone()
    }

    pub fn dispose(&self) {
        self.task.abort();
    }
}

impl Drop for JobFeed {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The job/proposal state machine:
///
/// ```text
/// OPEN --apply--> IN_PROGRESS --confirm--> PENDING --complete--> COMPLETED
/// {OPEN, IN_PROGRESS, PENDING} --cancel--> CANCELLED
/// ```
///
/// Writers may be separate devices, so there is no in-process lock anywhere
/// here: every transition is a single-document conditional write and the
/// store arbitrates races.
#[derive(Debug, Clone)]
pub struct JobService {
    store: StoreHandle,
}

impl JobService {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn create_job(
        &self,
        session: &Session,
        dto: CreateJobDto,
    ) -> Result<JobPosting, CoreError> {
        dto.validate()?;
        let job = self
            .store
            .create_job(&session.user_id, &session.contact, &dto)
            .await?;
        tracing::info!(job_id = %job.id, client_id = %job.client_id, title = %job.title, "job posted");
        Ok(job)
    }

    /// Claim an open job. Exactly one of any set of concurrent callers wins
    /// the conditional write; the rest get `JobAlreadyTaken` and no proposal
    /// row is created for them.
    pub async fn apply_for_job(
        &self,
        job_id: &str,
        photographer_id: &str,
    ) -> Result<Proposal, CoreError> {
        let won = self
            .store
            .try_transition_job(job_id, JobStatus::Open, JobStatus::InProgress)
            .await?;
        if !won {
            return match self.store.get_job_by_id(job_id).await? {
                None => Err(CoreError::JobNotFound(job_id.to_string())),
                Some(job) => {
                    tracing::info!(
                        job_id,
                        photographer_id,
                        status = job.status.as_str(),
                        "apply lost the conditional write"
                    );
                    Err(CoreError::JobAlreadyTaken(job_id.to_string()))
                }
            };
        }
        let proposal = match self
            .store
            .create_proposal(job_id, photographer_id, ProposalStatus::InProgress)
            .await
        {
            Ok(proposal) => proposal,
            Err(err) => {
                // The claim went through but the proposal write did not.
                // Release the job again or it stays IN_PROGRESS with no
                // claimant attached and nobody can ever win it. No proposal
                // exists yet, so the compare-and-set back to OPEN is safe.
                match self
                    .store
                    .try_transition_job(job_id, JobStatus::InProgress, JobStatus::Open)
                    .await
                {
                    Ok(true) => {
                        tracing::warn!(job_id, photographer_id, "proposal write failed, claim released");
                    }
                    Ok(false) => {
                        tracing::error!(job_id, "claim release found the job in an unexpected state");
                    }
                    Err(release_err) => {
                        tracing::error!(
                            job_id,
                            error = %release_err,
                            "claim release failed, job left claimed without a proposal"
                        );
                    }
                }
                return Err(err.into());
            }
        };
        tracing::info!(job_id, photographer_id, proposal_id = %proposal.id, "job claimed");
        Ok(proposal)
    }

    pub async fn confirm_job(&self, job_id: &str) -> Result<(), CoreError> {
        self.transition(job_id, JobStatus::InProgress, JobStatus::Pending)
            .await
    }

    /// Completing the job never touches its proposals; closing out a
    /// proposal is always an explicit separate `update_proposal_status`.
    pub async fn complete_job(&self, job_id: &str) -> Result<(), CoreError> {
        self.transition(job_id, JobStatus::Pending, JobStatus::Completed)
            .await
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<(), CoreError> {
        // Any non-terminal state may be cancelled. Each attempt is its own
        // atomic compare-and-set; terminal states never revert, so trying
        // the three sources in turn cannot mis-fire.
        for expected in [JobStatus::Open, JobStatus::InProgress, JobStatus::Pending] {
            if self
                .store
                .try_transition_job(job_id, expected, JobStatus::Cancelled)
                .await?
            {
                tracing::info!(job_id, from = expected.as_str(), "job cancelled");
                return Ok(());
            }
        }
        match self.store.get_job_by_id(job_id).await? {
            None => Err(CoreError::JobNotFound(job_id.to_string())),
            Some(job) => Err(CoreError::PreconditionFailed {
                entity: format!("job {job_id}"),
                expected: "OPEN, IN_PROGRESS or PENDING".to_string(),
                actual: job.status.as_str().to_string(),
            }),
        }
    }

    async fn transition(
        &self,
        job_id: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<(), CoreError> {
        if self.store.try_transition_job(job_id, expected, next).await? {
            tracing::info!(job_id, from = expected.as_str(), to = next.as_str(), "job transitioned");
            return Ok(());
        }
        match self.store.get_job_by_id(job_id).await? {
            None => Err(CoreError::JobNotFound(job_id.to_string())),
            Some(job) => Err(CoreError::PreconditionFailed {
                entity: format!("job {job_id}"),
                expected: expected.as_str().to_string(),
                actual: job.status.as_str().to_string(),
            }),
        }
    }

    /// Overwrites the proposal's status as its owner sees fit. Deliberately
    /// does not cascade to the job.
    pub async fn update_proposal_status(
        &self,
        proposal_id: &str,
        status: ProposalStatus,
    ) -> Result<(), CoreError> {
        if self.store.set_proposal_status(proposal_id, status).await? {
            tracing::info!(proposal_id, status = status.as_str(), "proposal status updated");
            Ok(())
        } else {
            Err(CoreError::ProposalNotFound(proposal_id.to_string()))
        }
    }

    /// The photographer's bid list, each proposal joined with its job. A
    /// proposal pointing at a missing job is dropped, not surfaced: a
    /// corrupt reference must not blank the whole view.
    pub async fn fetch_proposals(
        &self,
        photographer_id: &str,
    ) -> Result<Vec<ProposalView>, CoreError> {
        let proposals = self
            .store
            .get_proposals_for_photographer(photographer_id)
            .await?;
        let mut views = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            match self.store.get_job_by_id(&proposal.job_id).await? {
                Some(job) => views.push(ProposalView { proposal, job }),
                None => {
                    tracing::debug!(
                        proposal_id = %proposal.id,
                        job_id = %proposal.job_id,
                        "dropping proposal whose job is missing"
                    );
                }
            }
        }
        Ok(views)
    }

    pub async fn fetch_jobs(&self, client_id: &str) -> Result<Vec<JobPosting>, CoreError> {
        Ok(self.store.get_jobs_for_client(client_id).await?)
    }

    pub async fn fetch_open_jobs(&self) -> Result<Vec<JobPosting>, CoreError> {
        Ok(self.store.get_open_jobs().await?)
    }

    /// Live job board for photographers: every open job, newest first. A
    /// job that gets claimed drops out on the next snapshot. If the
    /// subscription dies the feed flips to `ConnectionLost` and stays
    /// there until the caller opens a fresh one.
    pub async fn watch_open_jobs(&self) -> Result<JobFeed, CoreError> {
        let mut subscription = self.store.subscribe_open_jobs().await?;
        let (state_tx, state_rx) = watch::channel(JobFeedState::Live(Vec::new()));

        let task = tokio::spawn(async move {
            loop {
                match subscription.recv().await {
                    Some(docs) => {
                        let mut jobs: Vec<JobPosting> =
                            docs.iter().map(JobPosting::from_document).collect();
                        jobs.sort_by(|a, b| {
                            b.posted_date
                                .cmp(&a.posted_date)
                                .then_with(|| a.id.cmp(&b.id))
                        });
                        if state_tx.send(JobFeedState::Live(jobs)).is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::warn!("open-jobs subscription closed by the store");
                        let _ = state_tx.send(JobFeedState::ConnectionLost);
                        break;
                    }
                }
            }
        });

        Ok(JobFeed {
            state: state_rx,
            task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::jobmodel::EventType;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> (JobService, StoreHandle) {
        let handle = StoreHandle::new(Arc::new(MemoryStore::new()), "test");
        (JobService::new(handle.clone()), handle)
    }

    fn dto() -> CreateJobDto {
        CreateJobDto {
            title: "Street portraits".to_string(),
            description: "Golden hour session".to_string(),
            budget: 120.0,
            location: "Manchester".to_string(),
            event_date: Utc::now(),
            event_type: EventType::Portrait,
            requirements: vec!["prime lens".to_string()],
        }
    }

    async fn open_job(service: &JobService) -> JobPosting {
        let session = Session::new("client-1", "client@example.com");
        service.create_job(&session, dto()).await.unwrap()
    }

    #[tokio::test]
    async fn create_job_rejects_invalid_input() {
        let (service, _) = service();
        let session = Session::new("client-1", "client@example.com");
        let mut bad = dto();
        bad.budget = -5.0;
        assert!(matches!(
            service.create_job(&session, bad).await,
            Err(CoreError::Validation(_))
        ));
        let mut empty = dto();
        empty.title.clear();
        assert!(matches!(
            service.create_job(&session, empty).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_applies_resolve_to_one_winner() {
        let (service, store) = service();
        let job = open_job(&service).await;

        let first = service.apply_for_job(&job.id, "ph1");
        let second = service.apply_for_job(&job.id, "ph2");
        let (first, second) = tokio::join!(first, second);

        assert!(
            first.is_ok() != second.is_ok(),
            "expected exactly one winner, got {first:?} / {second:?}"
        );
        let winner = first
            .as_ref()
            .ok()
            .or(second.as_ref().ok())
            .cloned()
            .unwrap();
        let loser = if first.is_err() {
            first.unwrap_err()
        } else {
            second.unwrap_err()
        };
        assert!(matches!(loser, CoreError::JobAlreadyTaken(_)));
        assert_eq!(winner.status, ProposalStatus::InProgress);

        // The job ends up claimed exactly once, with a single active proposal.
        let current = store.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::InProgress);
        let proposals = store.get_proposals_for_job(&job.id).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert!(proposals[0].status.is_active());
    }

    #[tokio::test]
    async fn many_concurrent_applies_still_yield_one_winner() {
        let (service, store) = service();
        let job = open_job(&service).await;

        let photographers: Vec<String> = (0..8).map(|i| format!("ph{i}")).collect();
        let results = futures::future::join_all(
            photographers
                .iter()
                .map(|ph| service.apply_for_job(&job.id, ph)),
        )
        .await;

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let taken = results
            .iter()
            .filter(|r| matches!(r, Err(CoreError::JobAlreadyTaken(_))))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(taken, photographers.len() - 1);

        let proposals = store.get_proposals_for_job(&job.id).await.unwrap();
        assert_eq!(proposals.len(), 1);
    }

    #[tokio::test]
    async fn losing_apply_creates_no_proposal() {
        let (service, store) = service();
        let job = open_job(&service).await;

        service.apply_for_job(&job.id, "ph1").await.unwrap();
        let err = service.apply_for_job(&job.id, "ph2").await.unwrap_err();
        assert!(matches!(err, CoreError::JobAlreadyTaken(_)));

        let proposals = store.get_proposals_for_job(&job.id).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].photographer_id, "ph1");
    }

    #[tokio::test]
    async fn failed_proposal_write_releases_the_claim() {
        let memory = MemoryStore::new();
        let handle = StoreHandle::new(Arc::new(memory.clone()), "test");
        let service = JobService::new(handle.clone());
        let job = open_job(&service).await;

        // The claim's compare-and-set succeeds but the proposal append
        // fails mid-apply.
        memory.fail_appends(true);
        let err = service.apply_for_job(&job.id, "ph1").await.unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));

        // The job is back to OPEN with no orphaned claim, so a retry wins.
        let current = handle.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::Open);
        assert!(handle.get_proposals_for_job(&job.id).await.unwrap().is_empty());

        memory.fail_appends(false);
        let proposal = service.apply_for_job(&job.id, "ph1").await.unwrap();
        assert_eq!(proposal.status, ProposalStatus::InProgress);
    }

    #[tokio::test]
    async fn apply_to_missing_job_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.apply_for_job("no-such-job", "ph1").await,
            Err(CoreError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn lifecycle_runs_open_to_completed() {
        let (service, store) = service();
        let job = open_job(&service).await;

        service.apply_for_job(&job.id, "ph1").await.unwrap();
        service.confirm_job(&job.id).await.unwrap();
        service.complete_job(&job.id).await.unwrap();

        let current = store.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::Completed);

        // Terminal: no further transitions apply.
        let err = service.cancel_job(&job.id).await.unwrap_err();
        assert!(matches!(err, CoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn out_of_order_transitions_fail_preconditions() {
        let (service, _) = service();
        let job = open_job(&service).await;

        // confirm and complete both need earlier states.
        assert!(matches!(
            service.confirm_job(&job.id).await,
            Err(CoreError::PreconditionFailed { .. })
        ));
        assert!(matches!(
            service.complete_job(&job.id).await,
            Err(CoreError::PreconditionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_reaches_every_non_terminal_state() {
        let (service, store) = service();

        let open = open_job(&service).await;
        service.cancel_job(&open.id).await.unwrap();
        assert_eq!(
            store.get_job_by_id(&open.id).await.unwrap().unwrap().status,
            JobStatus::Cancelled
        );

        let claimed = open_job(&service).await;
        service.apply_for_job(&claimed.id, "ph1").await.unwrap();
        service.cancel_job(&claimed.id).await.unwrap();

        let pending = open_job(&service).await;
        service.apply_for_job(&pending.id, "ph1").await.unwrap();
        service.confirm_job(&pending.id).await.unwrap();
        service.cancel_job(&pending.id).await.unwrap();
        assert_eq!(
            store.get_job_by_id(&pending.id).await.unwrap().unwrap().status,
            JobStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn completing_job_leaves_proposal_alone() {
        let (service, store) = service();
        let job = open_job(&service).await;
        let proposal = service.apply_for_job(&job.id, "ph1").await.unwrap();
        service.confirm_job(&job.id).await.unwrap();
        service.complete_job(&job.id).await.unwrap();

        // No cascade: the proposal still reads IN_PROGRESS until its owner
        // updates it explicitly.
        let stored = &store.get_proposals_for_job(&job.id).await.unwrap()[0];
        assert_eq!(stored.status, ProposalStatus::InProgress);

        service
            .update_proposal_status(&proposal.id, ProposalStatus::Completed)
            .await
            .unwrap();
        let stored = &store.get_proposals_for_job(&job.id).await.unwrap()[0];
        assert_eq!(stored.status, ProposalStatus::Completed);
    }

    #[tokio::test]
    async fn update_missing_proposal_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service
                .update_proposal_status("missing", ProposalStatus::Rejected)
                .await,
            Err(CoreError::ProposalNotFound(_))
        ));
    }

    async fn wait_for_board<F>(rx: &mut watch::Receiver<JobFeedState>, pred: F)
    where
        F: Fn(&JobFeedState) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if pred(&rx.borrow()) {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("job board never reached expected state")
    }

    #[tokio::test]
    async fn job_board_shows_open_jobs_and_drops_claimed_ones() {
        let (service, _) = service();
        let feed = service.watch_open_jobs().await.unwrap();
        let mut rx = feed.watch();

        let job = open_job(&service).await;
        wait_for_board(&mut rx, |s| matches!(s, JobFeedState::Live(jobs) if jobs.len() == 1)).await;

        service.apply_for_job(&job.id, "ph1").await.unwrap();
        wait_for_board(&mut rx, |s| matches!(s, JobFeedState::Live(jobs) if jobs.is_empty())).await;

        feed.dispose();
        feed.dispose();
    }

    #[tokio::test]
    async fn fetch_proposals_drops_dangling_job_references() {
        let (service, store) = service();
        let job = open_job(&service).await;
        service.apply_for_job(&job.id, "ph1").await.unwrap();

        // A proposal pointing nowhere; the join silently excludes it.
        store
            .create_proposal("deleted-job", "ph1", ProposalStatus::Pending)
            .await
            .unwrap();

        let views = service.fetch_proposals("ph1").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].job.id, job.id);
    }
}
