//! HTTP gateway and CLI for the switchyard control plane.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod executor;
pub mod state;
