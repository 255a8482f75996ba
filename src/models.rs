// models.rs
pub mod jobmodel;
pub mod messagemodel;
pub mod proposalmodel;
