//! Common test infrastructure for talos-orchestrator tests
//!
//! - `mocks`: a directory-backed git client, a merge-request host and a
//!   recording interaction sink
//! - `fixtures`: an in-memory registry and a fully wired orchestrator

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
