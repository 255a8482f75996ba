// dtos.rs
pub mod jobdtos;
pub mod messagedtos;
