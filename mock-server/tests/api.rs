use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Asset, Gist, Issue, Repo, RATE_LIMIT};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header(http::header::HOST, "api.test")
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

// --- issues ---

#[tokio::test]
async fn list_issues_returns_seeded_issues() {
    let resp = app()
        .oneshot(get("/repos/octocat/Hello-World/issues"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "link"), None);
    let issues: Vec<Issue> = body_json(resp).await;
    assert_eq!(issues.len(), 5);
}

#[tokio::test]
async fn list_issues_filters_by_state() {
    let resp = app()
        .oneshot(get("/repos/octocat/Hello-World/issues?state=closed"))
        .await
        .unwrap();

    let issues: Vec<Issue> = body_json(resp).await;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 3);
}

#[tokio::test]
async fn list_issues_paginates_with_link_header() {
    let resp = app()
        .oneshot(get("/repos/octocat/Hello-World/issues?page=2&per_page=2"))
        .await
        .unwrap();

    let link = header(&resp, "link").unwrap().to_string();
    assert!(link.contains("<http://api.test/repos/octocat/Hello-World/issues?page=3&per_page=2>; rel=\"next\""));
    assert!(link.contains("rel=\"prev\""));
    let issues: Vec<Issue> = body_json(resp).await;
    let numbers: Vec<u64> = issues.iter().map(|i| i.number).collect();
    assert_eq!(numbers, vec![3, 4]);
}

#[tokio::test]
async fn every_response_carries_rate_limit_headers() {
    let resp = app().oneshot(get("/meta")).await.unwrap();

    assert_eq!(header(&resp, "x-ratelimit-limit"), Some("60"));
    assert_eq!(
        header(&resp, "x-ratelimit-remaining"),
        Some((RATE_LIMIT - 1).to_string().as_str())
    );
    assert!(header(&resp, "x-ratelimit-reset").is_some());
}

#[tokio::test]
async fn get_issue_not_found_has_message() {
    let resp = app()
        .oneshot(get("/repos/octocat/Hello-World/issues/99"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn get_issue_honors_if_none_match() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/repos/octocat/Hello-World/issues/1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let etag = header(&resp, "etag").unwrap().to_string();

    let conditional = Request::builder()
        .uri("/repos/octocat/Hello-World/issues/1")
        .header(http::header::IF_NONE_MATCH, etag.as_str())
        .body(String::new())
        .unwrap();
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(conditional)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn create_issue_without_title_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/repos/octocat/Hello-World/issues", r#"{"body":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = body_json(resp).await;
    assert_eq!(body["errors"][0]["field"], "title");
}

// --- repositories ---

#[tokio::test]
async fn create_repo_returns_201_with_location() {
    let resp = app()
        .oneshot(json_request("POST", "/user/repos", r#"{"name":"hello","private":true}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(header(&resp, "location"), Some("/repos/octocat/hello"));
    let repo: Repo = body_json(resp).await;
    assert_eq!(repo.full_name, "octocat/hello");
    assert!(repo.private);
    assert!(repo.has_issues);
}

#[tokio::test]
async fn create_repo_without_name_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/user/repos", r#"{"private":true}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = body_json(resp).await;
    assert_eq!(body["message"], "Validation Failed");
    assert_eq!(body["errors"][0]["code"], "missing_field");
}

#[tokio::test]
async fn upload_asset_records_size_and_type() {
    let request = Request::builder()
        .method("POST")
        .uri("/repos/octocat/Hello-World/releases/1/assets?name=notes.txt&label=Notes")
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body("release notes".to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let asset: Asset = body_json(resp).await;
    assert_eq!(asset.name, "notes.txt");
    assert_eq!(asset.label.as_deref(), Some("Notes"));
    assert_eq!(asset.content_type, "text/plain");
    assert_eq!(asset.size, 13);
}

// --- gists ---

#[tokio::test]
async fn gist_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/gists",
            r#"{"public":true,"files":{"a.txt":{"content":"hi"}}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Gist = body_json(resp).await;
    let id = created.id;

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/gists/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Gist = body_json(resp).await;
    assert_eq!(fetched.files["a.txt"]["content"], "hi");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/gists/{id}"))
        .body(String::new())
        .unwrap();
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(delete)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/gists/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_gist_bad_uuid_returns_400() {
    let resp = app().oneshot(get("/gists/not-a-uuid")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- markdown ---

#[tokio::test]
async fn markdown_raw_renders_plain_text() {
    let request = Request::builder()
        .method("POST")
        .uri("/markdown/raw")
        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body("# Hello".to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "content-type"), Some("text/html;charset=utf-8"));
    assert_eq!(body_bytes(resp).await, "<h1>Hello</h1>");
}

#[tokio::test]
async fn markdown_raw_rejects_json() {
    let resp = app()
        .oneshot(json_request("POST", "/markdown/raw", r#"{"text":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

// --- search ---

#[tokio::test]
async fn search_applies_qualifiers() {
    let resp = app()
        .oneshot(get("/search/issues?q=issue+label%3Abug+state%3Aopen"))
        .await
        .unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["items"][0]["number"], 2);
    assert_eq!(body["items"][1]["number"], 4);
}

// --- users ---

#[tokio::test]
async fn current_user_requires_authentication() {
    let resp = app().oneshot(get("/user")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["message"], "Requires authentication");
}

#[tokio::test]
async fn current_user_accepts_token() {
    let request = Request::builder()
        .uri("/user")
        .header(http::header::AUTHORIZATION, "token s3cr3t")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-oauth-scopes"), Some("repo, user"));
    let body: Value = body_json(resp).await;
    assert_eq!(body["login"], "octocat");
}

#[tokio::test]
async fn rate_limit_reports_remaining() {
    let resp = app().oneshot(get("/rate_limit")).await.unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body["rate"]["limit"], RATE_LIMIT);
    assert_eq!(body["rate"]["remaining"], RATE_LIMIT - 1);
}
