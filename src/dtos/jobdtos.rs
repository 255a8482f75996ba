// dtos/jobdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::jobmodel::EventType;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJobDto {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "Description must be between 1 and 1000 characters"
    ))]
    pub description: String,

    #[validate(range(min = 0.0, message = "Budget must not be negative"))]
    pub budget: f64,

    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,

    pub event_date: DateTime<Utc>,

    pub event_type: EventType,

    #[serde(default)]
    pub requirements: Vec<String>,
}
