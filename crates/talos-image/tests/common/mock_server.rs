//! Mock registry helpers
//!
//! Provides wiremock endpoints speaking the subset of the OCI distribution
//! API the HTTP client uses.

use serde_json::json;
use talos_core::types::RegistryConfig;
use talos_image::{HttpRegistryClient, ParsedImage, TagParser};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REPOSITORY: &str = "acme/api";
pub const INDEX_DIGEST: &str = "sha256:1111";
pub const AMD64_DIGEST: &str = "sha256:2222";
pub const CONFIG_DIGEST: &str = "sha256:3333";
pub const CREATED: &str = "2026-03-01T12:00:00Z";

/// Client talking plain HTTP to the mock server
pub fn client() -> HttpRegistryClient {
    HttpRegistryClient::new(&RegistryConfig::default())
        .unwrap()
        .with_plain_http()
}

/// Image on the mock server's registry
pub fn server_image(server: &MockServer, suffix: &str) -> ParsedImage {
    let host = server.address().to_string();
    ParsedImage::parse(
        &format!("{}/{}{}", host, REPOSITORY, suffix),
        false,
        &TagParser::default(),
    )
    .unwrap()
}

/// Tag list split over two pages linked by a relative `Link` header
pub async fn mock_paginated_tags(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/tags/list", REPOSITORY)))
        .and(wiremock::matchers::query_param("last", "1.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": REPOSITORY,
            "tags": ["1.2", "latest"]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/tags/list", REPOSITORY)))
        .and(wiremock::matchers::query_param("n", "1000"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "link",
                    format!("</v2/{}/tags/list?n=2&last=1.1>; rel=\"next\"", REPOSITORY).as_str(),
                )
                .set_body_json(json!({
                    "name": REPOSITORY,
                    "tags": ["1.0", "1.1"]
                })),
        )
        .mount(server)
        .await;
}

/// Tag list behind a bearer challenge served by the same server
pub async fn mock_bearer_protected_tags(server: &MockServer) {
    let realm = format!("{}/token", server.uri());

    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t0ken"})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/tags/list", REPOSITORY)))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": ["2.0"]})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/tags/list", REPOSITORY)))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "www-authenticate",
            format!(
                "Bearer realm=\"{}\",service=\"registry.test\",scope=\"repository:{}:pull\"",
                realm, REPOSITORY
            )
            .as_str(),
        ))
        .mount(server)
        .await;
}

/// Multi-platform index -> amd64 manifest -> config blob
pub async fn mock_image_index(server: &MockServer, tag: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/manifests/{}", REPOSITORY, tag)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("docker-content-digest", INDEX_DIGEST)
                .set_body_json(json!({
                    "schemaVersion": 2,
                    "mediaType": "application/vnd.oci.image.index.v1+json",
                    "manifests": [
                        {"digest": "sha256:arm", "platform": {"os": "linux", "architecture": "arm64"}},
                        {"digest": AMD64_DIGEST, "platform": {"os": "linux", "architecture": "amd64"}}
                    ]
                })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/manifests/{}", REPOSITORY, AMD64_DIGEST)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schemaVersion": 2,
            "config": {"digest": CONFIG_DIGEST, "size": 10}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/blobs/{}", REPOSITORY, CONFIG_DIGEST)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": CREATED,
            "os": "linux",
            "architecture": "amd64"
        })))
        .mount(server)
        .await;
}
