//! Common test infrastructure for talos-locations tests
//!
//! - `fixtures`: an in-memory registry, repository config and working trees

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;

pub use fixtures::*;
