//! Common test infrastructure for talos-queue tests
//!
//! - `fixtures`: scheduled pushes and stores

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;

pub use fixtures::*;
