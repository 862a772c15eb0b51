//! Git access for Talos
//!
//! - [`GitClient`] drives a working clone: clone, commit, push, pull, branches.
//!   [`GitCli`] implements it over the `git` binary.
//! - [`GitHost`] talks to the hosting service to open merge requests.
//!   [`GitHubHost`] and [`GitLabHost`] implement it over their REST APIs.
//!
//! # Example
//!
//! ```no_run
//! use talos_git::{GitCli, GitClient};
//! use camino::Utf8Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let git = GitCli::new()?;
//! let dest = Utf8Path::new("/tmp/deploy");
//! git.clone_repository("https://github.com/acme/deploy.git", Some("main"), dest).await?;
//! println!("on {}", git.current_branch(dest).await?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod host;

pub use client::{CommitAuthor, GitCli, GitClient, GitCredentials, PushOptions};
pub use error::{Error, Result};
pub use host::{host_for, repository_path, GitHost, GitHubHost, GitLabHost, MergeRequest};
