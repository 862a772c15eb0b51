//! GitHub and GitLab merge-request APIs against a mock server
//!
//! Tests cover:
//! - Open merge request lookup by source branch
//! - Creation with an explicit or default target branch
//! - API errors surfacing as host errors

use serde_json::json;
use talos_git::{Error, GitHost, GitHubHost, GitLabHost};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REMOTE: &str = "https://example.com/acme/deploy.git";

fn github(server: &MockServer) -> GitHubHost {
    GitHubHost::new(reqwest::Client::new(), server.uri(), Some("gh-token".into()))
}

fn gitlab(server: &MockServer) -> GitLabHost {
    GitLabHost::new(reqwest::Client::new(), server.uri(), Some("gl-token".into()))
}

#[tokio::test]
async fn test_github_open_pull_request_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/deploy/pulls"))
        .and(query_param("state", "open"))
        .and(query_param("head", "acme:talos/abcd1234"))
        .and(header("authorization", "Bearer gh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": 7, "html_url": "https://example.com/acme/deploy/pull/7"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/deploy/pulls"))
        .and(query_param("head", "acme:talos/other"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let host = github(&server);
    assert!(host
        .has_open_merge_request_for_branch(REMOTE, "talos/abcd1234")
        .await
        .unwrap());
    assert!(!host
        .has_open_merge_request_for_branch(REMOTE, "talos/other")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_github_create_uses_default_branch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/deploy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "trunk"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/deploy/pulls"))
        .and(body_partial_json(json!({
            "head": "talos/abcd1234",
            "base": "trunk",
            "title": "Update nginx to 1.27"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "number": 12,
            "html_url": "https://example.com/acme/deploy/pull/12"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = github(&server)
        .create_merge_request_for_branch(REMOTE, "talos/abcd1234", None, "Update nginx to 1.27", "body")
        .await
        .unwrap();
    assert_eq!(created.number, 12);
    assert_eq!(created.url, "https://example.com/acme/deploy/pull/12");
}

#[tokio::test]
async fn test_github_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/deploy/pulls"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
        )
        .mount(&server)
        .await;

    let err = github(&server)
        .create_merge_request_for_branch(REMOTE, "talos/x", Some("main"), "t", "b")
        .await
        .unwrap_err();
    match err {
        Error::Host { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Validation Failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_gitlab_lookup_and_create() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/acme%2Fdeploy/merge_requests"))
        .and(query_param("state", "opened"))
        .and(query_param("source_branch", "talos/abcd1234"))
        .and(header("private-token", "gl-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/projects/acme%2Fdeploy/merge_requests"))
        .and(body_partial_json(json!({
            "source_branch": "talos/abcd1234",
            "target_branch": "main"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "iid": 3,
            "web_url": "https://example.com/acme/deploy/-/merge_requests/3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let host = gitlab(&server);
    assert!(!host
        .has_open_merge_request_for_branch(REMOTE, "talos/abcd1234")
        .await
        .unwrap());
    let created = host
        .create_merge_request_for_branch(REMOTE, "talos/abcd1234", Some("main"), "t", "b")
        .await
        .unwrap();
    assert_eq!(created.number, 3);
}
