//! Core domain types for switchyard: model descriptors, task classification,
//! request/response shapes, configuration, and the shared error type.
//!
//! This crate has no I/O and no async; every other crate in the workspace
//! depends on it.

pub mod config;
pub mod error;
pub mod model;
pub mod request;
pub mod trace;

pub use error::{BackendError, Error, ErrorCategory, Result};
