// service.rs
pub mod conversation_service;
pub mod job_service;
pub mod message_service;
