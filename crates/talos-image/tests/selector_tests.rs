//! Candidate selection against the fixture registry
//!
//! Tests cover:
//! - Digest-only upgrades of named releases
//! - Version upgrades capped by the bump ceiling
//! - No upgrade when already pinned at the best candidate
//! - Unknown tags in the registry being ignored

mod common;

use common::*;
use talos_core::BumpSize;

#[tokio::test]
async fn test_release_moves_by_digest_only() {
    let selector = standard_selector();
    let current = image("image2:latest@sha:000");

    let upgrade = selector
        .best_upgrade(&current, BumpSize::Major)
        .await
        .unwrap()
        .expect("latest moved");

    assert_eq!(upgrade.bump, BumpSize::Digest);
    assert_eq!(upgrade.new_image(&current).to_string(), "image2:latest@sha:001");
    assert_eq!(upgrade.created_at, created_at_for("sha:001"));
}

#[tokio::test]
async fn test_patch_ceiling_stops_at_latest_patch() {
    let selector = standard_selector();
    let current = image("image3:v2.3.3");

    let upgrade = selector
        .best_upgrade(&current, BumpSize::Patch)
        .await
        .unwrap()
        .expect("patch available");

    assert_eq!(upgrade.bump, BumpSize::Patch);
    assert_eq!(upgrade.new_image(&current).to_string(), "image3:v2.3.5@sha:003");
}

#[tokio::test]
async fn test_major_ceiling_takes_highest_version() {
    let selector = standard_selector();
    let current = image("image3:v2.3.3@sha:002");

    let upgrade = selector
        .best_upgrade(&current, BumpSize::Major)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(upgrade.bump, BumpSize::Major);
    assert_eq!(upgrade.tag.to_string(), "v3.0.0");
}

#[tokio::test]
async fn test_pinned_at_best_is_no_upgrade() {
    let selector = standard_selector();
    let current = image("image3:v2.3.5@sha:003");

    let upgrade = selector.best_upgrade(&current, BumpSize::Patch).await.unwrap();
    assert!(upgrade.is_none());
}

#[tokio::test]
async fn test_same_version_new_digest_is_digest_bump() {
    let selector = standard_selector();
    let current = image("image3:v3.0.0@sha:999");

    let upgrade = selector
        .best_upgrade(&current, BumpSize::Major)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upgrade.bump, BumpSize::Digest);
    assert_eq!(upgrade.digest, "sha:005");
}

#[tokio::test]
async fn test_untagged_follows_default_release() {
    let selector = standard_selector();
    let current = image("image2@sha:000");

    let upgrade = selector
        .best_upgrade(&current, BumpSize::Digest)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upgrade.bump, BumpSize::Digest);
    assert_eq!(upgrade.new_image(&current).to_string(), "image2@sha:001");
}

#[tokio::test]
async fn test_unparseable_registry_tags_are_ignored() {
    let selector = standard_selector();
    let candidates = selector
        .sorted_candidate_tags(&image("image2:stable"), BumpSize::Major)
        .await
        .unwrap();
    let names: Vec<String> = candidates.iter().map(|t| t.to_string()).collect();
    assert_eq!(names, vec!["stable"]);
}

#[tokio::test]
async fn test_registry_failure_is_surfaced() {
    let selector = standard_selector();
    let result = selector.best_upgrade(&image("missing:1.0"), BumpSize::Major).await;
    assert!(result.is_err());
}
