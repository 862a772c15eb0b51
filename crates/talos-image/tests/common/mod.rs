//! Common test infrastructure for talos-image tests
//!
//! - `fixtures`: an in-memory registry with the standard test images
//! - `mock_server`: wiremock setup helpers for registry API tests

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod mock_server;

pub use fixtures::*;
pub use mock_server::*;
