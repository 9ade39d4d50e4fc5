//! GitLab and Gitea adapters against a mock HTTP server

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repomirror::provider::gitea::GiteaGateway;
use repomirror::provider::gitlab::GitLabGateway;
use repomirror::provider::rest::{RestClient, TokenHeader};
use repomirror::{CreateOption, ProjectInfo, ProviderConfig, ProviderGateway, ProviderType, RunContext, Visibility};

fn gitlab(server: &MockServer) -> GitLabGateway {
    let client = RestClient::new(
        format!("{}/api/v4", server.uri()),
        TokenHeader::PrivateToken("glpat-test".to_string()),
    )
    .unwrap();
    GitLabGateway::with_client(client)
}

fn gitea(server: &MockServer) -> GiteaGateway {
    let client = RestClient::new(
        format!("{}/api/v1", server.uri()),
        TokenHeader::Token("gitea-test".to_string()),
    )
    .unwrap();
    GiteaGateway::with_client(client)
}

fn gitlab_project(id: u64, path: &str) -> serde_json::Value {
    json!({
        "id": id,
        "path": path,
        "description": null,
        "http_url_to_repo": format!("https://gitlab.com/platform/{}.git", path),
        "ssh_url_to_repo": format!("git@gitlab.com:platform/{}.git", path),
        "default_branch": "main",
        "last_activity_at": "2024-03-01T12:00:00Z",
        "visibility": "private"
    })
}

fn create_option(name: &str) -> CreateOption {
    let project = ProjectInfo::new(name)
        .unwrap()
        .with_description(Some("mirrored".to_string()))
        .with_default_branch(Some("trunk".to_string()))
        .with_visibility(Visibility::Private);
    CreateOption::from_project(&project)
}

#[tokio::test]
async fn test_gitlab_listing_follows_next_page_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/groups/platform/projects"))
        .and(query_param("page", "1"))
        .and(header("PRIVATE-TOKEN", "glpat-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-next-page", "2")
                .set_body_json(json!([gitlab_project(1, "alpha"), gitlab_project(2, "beta")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/groups/platform/projects"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-next-page", "")
                .set_body_json(json!([gitlab_project(3, "gamma")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderType::Gitlab).with_group("platform");
    let projects = gitlab(&server)
        .list_projects(&RunContext::new(), &config)
        .await
        .unwrap();

    let names: Vec<&str> = projects.iter().map(|p| p.name()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
    assert_eq!(projects[2].project_id.as_deref(), Some("3"));
    assert_eq!(projects[0].visibility, Visibility::Private);
}

#[tokio::test]
async fn test_gitlab_listing_error_fails_whole_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/users/me/projects"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-next-page", "2")
                .set_body_json(json!([gitlab_project(1, "alpha")])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/users/me/projects"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderType::Gitlab).with_user("me");
    let err = gitlab(&server)
        .project_infos(&RunContext::new(), &config, false)
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<repomirror::ListingError>().is_some());
}

#[tokio::test]
async fn test_gitlab_create_in_group_namespace() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/groups"))
        .and(query_param("search", "platform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "full_path": "other/platform" },
            { "id": 42, "full_path": "platform" }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects"))
        .and(body_partial_json(json!({
            "name": "alpha",
            "namespace_id": 42,
            "default_branch": "trunk",
            "visibility": "private"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1001 })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderType::Gitlab).with_group("platform");
    let id = gitlab(&server)
        .create(&RunContext::new(), &config, &create_option("alpha"))
        .await
        .unwrap();

    assert_eq!(id, "1001");
}

#[tokio::test]
async fn test_gitlab_unauthorized_namespace_lookup() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/groups"))
        .respond_with(ResponseTemplate::new(401).set_body_string("401 Unauthorized"))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderType::Gitlab).with_group("platform");
    let err = gitlab(&server)
        .create(&RunContext::new(), &config, &create_option("alpha"))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("authentication failed: please check your token permissions"));
}

#[tokio::test]
async fn test_gitlab_protect_tolerates_existing_protection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/platform%2Falpha/protected_branches"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "Protected branch 'main' already exists" })))
        .mount(&server)
        .await;

    gitlab(&server)
        .protect(&RunContext::new(), "platform", "alpha", "main")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_gitea_listing_pages_until_short_page() {
    let server = MockServer::start().await;

    let full: Vec<serde_json::Value> = (0..50)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("repo-{:02}", i),
                "clone_url": format!("https://gitea.example.com/mirrors/repo-{:02}.git", i),
                "default_branch": "main",
                "private": false
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/api/v1/orgs/mirrors/repos"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "token gitea-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/orgs/mirrors/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 99,
            "name": "tail",
            "clone_url": "https://gitea.example.com/mirrors/tail.git",
            "fork": true
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ProviderType::Gitea).with_group("mirrors");
    let projects = gitea(&server)
        .list_projects(&RunContext::new(), &config)
        .await
        .unwrap();

    assert_eq!(projects.len(), 51);
    assert_eq!(projects[50].name(), "tail");
    assert!(projects[50].is_fork);
    assert_eq!(projects[50].default_branch, "main");
}

#[tokio::test]
async fn test_gitea_create_and_set_default_branch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/orgs/mirrors/repos"))
        .and(body_partial_json(json!({ "name": "alpha", "private": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 5,
            "name": "alpha",
            "full_name": "mirrors/alpha"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/v1/repos/mirrors/alpha"))
        .and(body_partial_json(json!({ "default_branch": "trunk" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5, "name": "alpha" })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = RunContext::new();
    let config = ProviderConfig::new(ProviderType::Gitea).with_group("mirrors");
    let gateway = gitea(&server);

    let id = gateway.create(&ctx, &config, &create_option("alpha")).await.unwrap();
    assert_eq!(id, "mirrors/alpha");

    gateway.default_branch(&ctx, "mirrors", "alpha", "trunk").await.unwrap();
}
