// repo/proposalrepo.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::StoreHandle;
use crate::models::proposalmodel::{Proposal, ProposalStatus};
use crate::store::{Filter, StoreError};

#[async_trait]
pub trait ProposalRepo {
    async fn create_proposal(
        &self,
        job_id: &str,
        photographer_id: &str,
        status: ProposalStatus,
    ) -> Result<Proposal, StoreError>;

    async fn get_proposals_for_photographer(
        &self,
        photographer_id: &str,
    ) -> Result<Vec<Proposal>, StoreError>;

    async fn get_proposals_for_job(&self, job_id: &str) -> Result<Vec<Proposal>, StoreError>;

    /// Unconditional status overwrite. `Ok(false)` only when the proposal
    /// does not exist.
    async fn set_proposal_status(
        &self,
        proposal_id: &str,
        status: ProposalStatus,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl ProposalRepo for StoreHandle {
    async fn create_proposal(
        &self,
        job_id: &str,
        photographer_id: &str,
        status: ProposalStatus,
    ) -> Result<Proposal, StoreError> {
        let fields = json!({
            "jobId": job_id,
            "photographerId": photographer_id,
            "status": status.as_str(),
            "proposalDate": Utc::now().to_rfc3339(),
        });
        let doc = self.client.append(self.proposals(), fields).await?;
        Ok(Proposal::from_document(&doc))
    }

    async fn get_proposals_for_photographer(
        &self,
        photographer_id: &str,
    ) -> Result<Vec<Proposal>, StoreError> {
        let docs = self
            .client
            .get_once(
                self.proposals(),
                Filter::new().eq("photographerId", photographer_id),
            )
            .await?;
        Ok(docs.iter().map(Proposal::from_document).collect())
    }

    async fn get_proposals_for_job(&self, job_id: &str) -> Result<Vec<Proposal>, StoreError> {
        let docs = self
            .client
            .get_once(self.proposals(), Filter::new().eq("jobId", job_id))
            .await?;
        Ok(docs.iter().map(Proposal::from_document).collect())
    }

    async fn set_proposal_status(
        &self,
        proposal_id: &str,
        status: ProposalStatus,
    ) -> Result<bool, StoreError> {
        // Empty expected set: the write applies whenever the document exists.
        self.client
            .conditional_update(
                self.proposals(),
                proposal_id,
                json!({}),
                json!({ "status": status.as_str() }),
            )
            .await
    }
}
