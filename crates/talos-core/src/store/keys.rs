//! Versioned key schema
//!
//! Every key Talos writes is built here: `talos:<version>:<kind>:<parts...>`.
//! Bumping [`SCHEMA_VERSION`] orphans all previously written state.

pub const NAMESPACE: &str = "talos";
pub const SCHEMA_VERSION: &str = "v1";

/// Placeholder for an unset branch (the remote default branch)
const DEFAULT_BRANCH: &str = "~";

fn key(kind: &str, parts: &[&str]) -> String {
    let mut key = format!("{}:{}:{}", NAMESPACE, SCHEMA_VERSION, kind);
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}

/// Serialized queued push
pub fn push(id: &str) -> String {
    key("push", &[id])
}

/// Set of queued push ids
pub fn push_index() -> String {
    key("push-index", &[])
}

/// Serialized dead letter
pub fn dead_letter(id: &str) -> String {
    key("dead-letter", &[id])
}

/// Set of dead-letter ids
pub fn dead_letter_index() -> String {
    key("dead-letter-index", &[])
}

/// Sliding window of landed pushes touching a registry domain
pub fn domain_window(domain: &str) -> String {
    key("throttle-domain", &[domain])
}

/// Sliding window of landed pushes on a repository branch
pub fn repository_window(remote: &str, branch: Option<&str>) -> String {
    key(
        "throttle-repository",
        &[branch.unwrap_or(DEFAULT_BRANCH), remote],
    )
}

/// Cached notification/interaction state for one update identity
pub fn update_data(id: &str) -> String {
    key("update-data", &[id])
}

/// Advisory lock held by the queue consumer
pub fn queue_lock() -> String {
    key("queue-lock", &[])
}

/// Cached tag list for an untagged image
pub fn registry_tags(untagged: &str) -> String {
    key("registry-tags", &[untagged])
}

/// Cached inspection of a tagged image
pub fn registry_inspection(image: &str) -> String {
    key("registry-inspection", &[image])
}
