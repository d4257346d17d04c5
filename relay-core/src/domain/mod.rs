//! Core domain types
//!
//! This module contains the structures shared between the job controller
//! client (which puts tasks on the wire) and the engine (which builds and
//! tracks them).

pub mod env;
pub mod mapping;
pub mod outcome;
pub mod step;
pub mod task;
