// models/jobmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Open,
    InProgress,
    Pending,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// The one parse point for stored job statuses. The store has no schema
    /// enforcement, so an unknown string degrades to `Open` and the flag
    /// tells the caller the value was bogus.
    pub fn parse(raw: &str) -> (JobStatus, bool) {
        match raw {
            "OPEN" => (JobStatus::Open, true),
            "IN_PROGRESS" => (JobStatus::InProgress, true),
            "PENDING" => (JobStatus::Pending, true),
            "COMPLETED" => (JobStatus::Completed, true),
            "CANCELLED" => (JobStatus::Cancelled, true),
            _ => (JobStatus::Open, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "OPEN",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Pending => "PENDING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Wedding,
    Corporate,
    Portrait,
    Fashion,
    Product,
    RealEstate,
    Birthday,
    Graduation,
    Nature,
    Street,
    Architecture,
    Food,
    Other,
}

impl EventType {
    pub fn parse(raw: &str) -> (EventType, bool) {
        match raw {
            "WEDDING" => (EventType::Wedding, true),
            "CORPORATE" => (EventType::Corporate, true),
            "PORTRAIT" => (EventType::Portrait, true),
            "FASHION" => (EventType::Fashion, true),
            "PRODUCT" => (EventType::Product, true),
            "REAL_ESTATE" => (EventType::RealEstate, true),
            "BIRTHDAY" => (EventType::Birthday, true),
            "GRADUATION" => (EventType::Graduation, true),
            "NATURE" => (EventType::Nature, true),
            "STREET" => (EventType::Street, true),
            "ARCHITECTURE" => (EventType::Architecture, true),
            "FOOD" => (EventType::Food, true),
            "OTHER" => (EventType::Other, true),
            _ => (EventType::Other, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Wedding => "WEDDING",
            EventType::Corporate => "CORPORATE",
            EventType::Portrait => "PORTRAIT",
            EventType::Fashion => "FASHION",
            EventType::Product => "PRODUCT",
            EventType::RealEstate => "REAL_ESTATE",
            EventType::Birthday => "BIRTHDAY",
            EventType::Graduation => "GRADUATION",
            EventType::Nature => "NATURE",
            EventType::Street => "STREET",
            EventType::Architecture => "ARCHITECTURE",
            EventType::Food => "FOOD",
            EventType::Other => "OTHER",
        }
    }
}

/// A client's request for photography services. Never deleted; it only ever
/// moves to a terminal status, and the status field is mutated exclusively
/// through conditional writes in the job service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub location: String,
    pub event_date: DateTime<Utc>,
    pub event_type: EventType,
    pub requirements: Vec<String>,
    pub client_id: String,
    pub client_name: String,
    pub posted_by: String,
    pub posted_date: DateTime<Utc>,
    pub status: JobStatus,
}

impl JobPosting {
    /// Field-by-field read with defaults, the only way to get a job out of
    /// the store. A malformed row is repaired, logged and kept in listings;
    /// it never becomes an error.
    pub fn from_document(doc: &Document) -> JobPosting {
        let (status, status_valid) = JobStatus::parse(doc.get_str("status").unwrap_or("OPEN"));
        if !status_valid {
            tracing::warn!(job_id = %doc.id, "unknown job status in store, defaulting to OPEN");
        }
        let (event_type, event_valid) =
            EventType::parse(doc.get_str("eventType").unwrap_or("OTHER"));
        if !event_valid {
            tracing::warn!(job_id = %doc.id, "unknown event type in store, defaulting to OTHER");
        }

        JobPosting {
            id: doc.id.clone(),
            title: doc.get_str("title").unwrap_or_default().to_string(),
            description: doc.get_str("description").unwrap_or_default().to_string(),
            budget: doc.get_f64("budget").unwrap_or(0.0),
            location: doc.get_str("location").unwrap_or_default().to_string(),
            event_date: doc.get_date("eventDate").unwrap_or_else(Utc::now),
            event_type,
            requirements: doc.get_str_list("requirements").unwrap_or_default(),
            client_id: doc.get_str("clientId").unwrap_or_default().to_string(),
            client_name: doc.get_str("clientName").unwrap_or_default().to_string(),
            posted_by: doc.get_str("postedBy").unwrap_or("Unknown").to_string(),
            posted_date: doc.get_date("postedDate").unwrap_or_else(Utc::now),
            status,
        }
    }

    pub fn to_fields(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.description,
            "budget": self.budget,
            "location": self.location,
            "eventDate": self.event_date.to_rfc3339(),
            "eventType": self.event_type.as_str(),
            "requirements": self.requirements,
            "clientId": self.client_id,
            "clientName": self.client_name,
            "postedBy": self.posted_by,
            "postedDate": self.posted_date.to_rfc3339(),
            "status": self.status.as_str(),
        })
    }
}
