//! Common test infrastructure for talos-git tests
//!
//! - `repos`: local bare remotes and clones driven by the real `git` binary

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod repos;

pub use repos::*;
