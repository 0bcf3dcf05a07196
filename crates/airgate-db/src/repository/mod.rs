//! # Repository Pattern
//!
//! Data access is exposed through repository types that own a pool clone.
//! SQL never leaks above this layer: the store facade and the sync engine
//! only see domain types and typed outcomes.
//!
//! ## Repositories
//! - [`sample::SampleRepository`] - the samples table and its upload-status
//!   state machine

pub mod sample;

pub use sample::{InsertOutcome, SampleRepository};
