// repo/jobrepo.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::StoreHandle;
use crate::dtos::jobdtos::CreateJobDto;
use crate::models::jobmodel::{JobPosting, JobStatus};
use crate::store::{Filter, StoreError, Subscription};

/// CRUD and query over job postings. Owns no business rules; every status
/// transition goes through `try_transition_job` so the compare-and-set is
/// the only writer of the status field.
#[async_trait]
pub trait JobRepo {
    async fn create_job(
        &self,
        client_id: &str,
        posted_by: &str,
        dto: &CreateJobDto,
    ) -> Result<JobPosting, StoreError>;

    async fn get_job_by_id(&self, job_id: &str) -> Result<Option<JobPosting>, StoreError>;

    async fn get_jobs_for_client(&self, client_id: &str) -> Result<Vec<JobPosting>, StoreError>;

    async fn get_open_jobs(&self) -> Result<Vec<JobPosting>, StoreError>;

    /// Change feed over currently-open jobs, for the photographers' live
    /// job board.
    async fn subscribe_open_jobs(&self) -> Result<Subscription, StoreError>;

    /// Single-document compare-and-set on the status field. `Ok(false)`
    /// means the precondition did not hold (or the job is gone); the caller
    /// decides what that means.
    async fn try_transition_job(
        &self,
        job_id: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl JobRepo for StoreHandle {
    async fn create_job(
        &self,
        client_id: &str,
        posted_by: &str,
        dto: &CreateJobDto,
    ) -> Result<JobPosting, StoreError> {
        let fields = json!({
            "title": dto.title,
            "description": dto.description,
            "budget": dto.budget,
            "location": dto.location,
            "eventDate": dto.event_date.to_rfc3339(),
            "eventType": dto.event_type.as_str(),
            "requirements": dto.requirements,
            "clientId": client_id,
            "clientName": posted_by,
            "postedBy": posted_by,
            "postedDate": Utc::now().to_rfc3339(),
            "status": JobStatus::Open.as_str(),
        });
        let doc = self.client.append(self.jobs(), fields).await?;
        Ok(JobPosting::from_document(&doc))
    }

    async fn get_job_by_id(&self, job_id: &str) -> Result<Option<JobPosting>, StoreError> {
        let doc = self.client.get_by_id(self.jobs(), job_id).await?;
        Ok(doc.as_ref().map(JobPosting::from_document))
    }

    async fn get_jobs_for_client(&self, client_id: &str) -> Result<Vec<JobPosting>, StoreError> {
        let docs = self
            .client
            .get_once(self.jobs(), Filter::new().eq("clientId", client_id))
            .await?;
        Ok(docs.iter().map(JobPosting::from_document).collect())
    }

    async fn get_open_jobs(&self) -> Result<Vec<JobPosting>, StoreError> {
        let docs = self
            .client
            .get_once(self.jobs(), Filter::new().eq("status", JobStatus::Open.as_str()))
            .await?;
        Ok(docs.iter().map(JobPosting::from_document).collect())
    }

    async fn subscribe_open_jobs(&self) -> Result<Subscription, StoreError> {
        self.client
            .subscribe(self.jobs(), Filter::new().eq("status", JobStatus::Open.as_str()))
            .await
    }

    async fn try_transition_job(
        &self,
        job_id: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool, StoreError> {
        self.client
            .conditional_update(
                self.jobs(),
                job_id,
                json!({ "status": expected.as_str() }),
                json!({ "status": next.as_str() }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::jobmodel::EventType;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn handle() -> StoreHandle {
        StoreHandle::new(Arc::new(MemoryStore::new()), "test")
    }

    fn dto() -> CreateJobDto {
        CreateJobDto {
            title: "Graduation shoot".to_string(),
            description: "Two hours on campus".to_string(),
            budget: 150.0,
            location: "Bristol".to_string(),
            event_date: Utc::now(),
            event_type: EventType::Graduation,
            requirements: vec![],
        }
    }

    #[tokio::test]
    async fn created_job_starts_open_and_is_fetchable() {
        let store = handle();
        let job = store.create_job("c1", "c1@example.com", &dto()).await.unwrap();
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.client_id, "c1");

        let fetched = store.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(fetched, job);
        assert_eq!(store.get_open_jobs().await.unwrap().len(), 1);
        assert_eq!(store.get_jobs_for_client("c1").await.unwrap().len(), 1);
        assert!(store.get_jobs_for_client("c2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transition_respects_expected_status() {
        let store = handle();
        let job = store.create_job("c1", "c1@example.com", &dto()).await.unwrap();

        assert!(store
            .try_transition_job(&job.id, JobStatus::Open, JobStatus::InProgress)
            .await
            .unwrap());
        assert!(!store
            .try_transition_job(&job.id, JobStatus::Open, JobStatus::InProgress)
            .await
            .unwrap());

        let current = store.get_job_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::InProgress);
        assert!(store.get_open_jobs().await.unwrap().is_empty());
    }
}
