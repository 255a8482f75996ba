// models/proposalmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::jobmodel::JobPosting;
use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    InProgress,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl ProposalStatus {
    pub fn parse(raw: &str) -> (ProposalStatus, bool) {
        match raw {
            "PENDING" => (ProposalStatus::Pending, true),
            "IN_PROGRESS" => (ProposalStatus::InProgress, true),
            "ACCEPTED" => (ProposalStatus::Accepted, true),
            "REJECTED" => (ProposalStatus::Rejected, true),
            "COMPLETED" => (ProposalStatus::Completed, true),
            "CANCELLED" => (ProposalStatus::Cancelled, true),
            _ => (ProposalStatus::Pending, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::InProgress => "IN_PROGRESS",
            ProposalStatus::Accepted => "ACCEPTED",
            ProposalStatus::Rejected => "REJECTED",
            ProposalStatus::Completed => "COMPLETED",
            ProposalStatus::Cancelled => "CANCELLED",
        }
    }

    /// At most one proposal per job may hold an active status.
    pub fn is_active(&self) -> bool {
        matches!(self, ProposalStatus::InProgress | ProposalStatus::Accepted)
    }
}

/// A photographer's claim on a job posting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub id: String,
    pub job_id: String,
    pub photographer_id: String,
    pub status: ProposalStatus,
    pub proposal_date: DateTime<Utc>,
}

impl Proposal {
    pub fn from_document(doc: &Document) -> Proposal {
        let (status, valid) = ProposalStatus::parse(doc.get_str("status").unwrap_or("PENDING"));
        if !valid {
            tracing::warn!(proposal_id = %doc.id, "unknown proposal status in store, defaulting to PENDING");
        }
        Proposal {
            id: doc.id.clone(),
            job_id: doc.get_str("jobId").unwrap_or_default().to_string(),
            photographer_id: doc.get_str("photographerId").unwrap_or_default().to_string(),
            status,
            proposal_date: doc.get_date("proposalDate").unwrap_or_else(Utc::now),
        }
    }

    pub fn to_fields(&self) -> Value {
        json!({
            "jobId": self.job_id,
            "photographerId": self.photographer_id,
            "status": self.status.as_str(),
            "proposalDate": self.proposal_date.to_rfc3339(),
        })
    }
}

/// A proposal joined with the job it references. Proposals whose job is
/// gone never make it into one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalView {
    pub proposal: Proposal,
    pub job: JobPosting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_status_degrades_to_pending() {
        assert_eq!(ProposalStatus::parse("???"), (ProposalStatus::Pending, false));
        assert_eq!(
            ProposalStatus::parse("ACCEPTED"),
            (ProposalStatus::Accepted, true)
        );
    }

    #[test]
    fn active_statuses_are_exactly_in_progress_and_accepted() {
        assert!(ProposalStatus::InProgress.is_active());
        assert!(ProposalStatus::Accepted.is_active());
        assert!(!ProposalStatus::Pending.is_active());
        assert!(!ProposalStatus::Rejected.is_active());
        assert!(!ProposalStatus::Completed.is_active());
        assert!(!ProposalStatus::Cancelled.is_active());
    }

    #[test]
    fn proposal_round_trips_through_store_fields() {
        let proposal = Proposal {
            id: "p1".to_string(),
            job_id: "j1".to_string(),
            photographer_id: "ph1".to_string(),
            status: ProposalStatus::InProgress,
            proposal_date: Utc::now(),
        };
        let doc = Document {
            id: proposal.id.clone(),
            fields: proposal.to_fields(),
        };
        assert_eq!(Proposal::from_document(&doc), proposal);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let doc = Document {
            id: "p2".to_string(),
            fields: json!({}),
        };
        let proposal = Proposal::from_document(&doc);
        assert_eq!(proposal.job_id, "");
        assert_eq!(proposal.status, ProposalStatus::Pending);
    }
}
