//! Data transfer objects
//!
//! Wire types exchanged with the job controller service.

pub mod task;
