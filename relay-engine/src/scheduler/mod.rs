//! Scheduler layer
//!
//! Watches submitted tasks until the job controller reports a final state.
//! Each submitted job gets its own poller task.

pub mod poller;

pub use poller::{PollOutcome, PollPolicy, PollSupervisor};
