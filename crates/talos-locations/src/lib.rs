//! Image reference locations for Talos
//!
//! A location is one place in a repository where an image reference lives:
//! a Dockerfile `FROM` line, a Compose service `image:` value, or an
//! annotated scalar in any YAML file. Locations found together in a sync
//! group are combined into one [`AtomicUpdateLocation`] that moves all of
//! them in a single commit or not at all.
//!
//! Writes never touch the filesystem directly: every location stages its
//! edit through a [`FileStage`], and a [`StagingBuffer`] performs the
//! physical writes only once every edit of a push has staged.

pub mod error;
pub mod identity;
pub mod location;
pub mod push;
pub mod scanner;
pub mod stage;
pub mod sync;

pub use error::{Error, Result};
pub use identity::{IdentityBase, LocationKind, UpdateIdentity};
pub use location::{
    AtomicUpdateLocation, ComposeLocation, DockerfileLocation, Snapshot, SubatomicLocation,
    UpdateLocation, YamlLocation,
};
pub use push::{DeadLetter, ImageUpdateOperation, ImageWriter, PendingWrite, ScheduledPush};
pub use scanner::{
    default_scanners, ComposeScanner, DockerfileScanner, LocationScanner, ScanFailure,
    ScanResult, YamlScanner,
};
pub use stage::{FileStage, StagingBuffer};
pub use sync::{resolve_sync_groups, GroupRejection, SyncResolution};
