//! Relay Core
//!
//! Core types and abstractions for the Relay remote job adapter.
//!
//! This crate contains:
//! - Domain types: path mappings, step specifications, task descriptors, poll operations
//! - DTOs: Data transfer objects for the job controller wire protocol

pub mod domain;
pub mod dto;
