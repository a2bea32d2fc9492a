//! A small GitHub-style REST API used to exercise the dispatch engine.
//!
//! Covers issues (with `Link` pagination and `ETag` validators), repositories
//! (with GitHub-shaped 422 bodies), gists, markdown rendering, release asset
//! uploads, an authenticated `/user` endpoint and rate-limit headers on every
//! response. State lives in memory and is seeded with five issues on
//! `octocat/Hello-World`.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const RATE_LIMIT: u64 = 60;
pub const RATE_RESET: u64 = 1_700_000_000;
pub const SEED_OWNER: &str = "octocat";
pub const SEED_REPO: &str = "Hello-World";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub repository: String,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub labels: Vec<String>,
    /// Bumped on every edit; feeds the `ETag`.
    #[serde(default)]
    pub version: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub has_issues: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gist {
    pub id: Uuid,
    pub description: Option<String>,
    pub public: bool,
    pub files: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    pub label: Option<String>,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Default)]
pub struct Store {
    pub issues: Vec<Issue>,
    pub repos: Vec<Repo>,
    pub gists: HashMap<Uuid, Gist>,
    pub assets: Vec<Asset>,
    pub requests: u64,
}

impl Store {
    fn seeded() -> Self {
        let repository = format!("{SEED_OWNER}/{SEED_REPO}");
        let issues = (1..=5)
            .map(|number| Issue {
                number,
                repository: repository.clone(),
                title: format!("Issue {number}"),
                body: None,
                state: if number == 3 { "closed" } else { "open" }.to_string(),
                labels: if number % 2 == 0 {
                    vec!["bug".to_string()]
                } else {
                    Vec::new()
                },
                version: 0,
            })
            .collect();
        Self {
            issues,
            ..Self::default()
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route(
            "/repos/{owner}/{repo}/issues",
            get(list_issues).post(create_issue),
        )
        .route(
            "/repos/{owner}/{repo}/issues/{number}",
            get(get_issue).patch(edit_issue),
        )
        .route("/repos/{owner}/{repo}", get(get_repo))
        .route("/repos/{owner}/{repo}/releases/{id}/assets", post(upload_asset))
        .route("/user/repos", get(list_repos).post(create_repo))
        .route("/gists", get(list_gists).post(create_gist))
        .route("/gists/{id}", get(get_gist).delete(delete_gist))
        .route("/markdown", post(render_markdown))
        .route("/markdown/raw", post(render_markdown_raw))
        .route("/search/issues", get(search_issues))
        .route("/user", get(current_user))
        .route("/users/{user}", get(get_user))
        .route("/rate_limit", get(rate_limit_status))
        .route("/meta", get(meta))
        .layer(middleware::from_fn_with_state(db.clone(), rate_limit))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "message": message,
            "documentation_url": "https://docs.github.com/rest",
        })),
    )
        .into_response()
}

fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Not Found")
}

fn validation_failed(resource: &str, field: &str, code: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "message": "Validation Failed",
            "errors": [{ "resource": resource, "field": field, "code": code }],
        })),
    )
        .into_response()
}

/// Count every request and stamp the `X-RateLimit-*` headers.
async fn rate_limit(State(db): State<Db>, request: Request, next: Next) -> Response {
    debug!(method = %request.method(), uri = %request.uri(), "request");
    let remaining = {
        let mut store = db.write().await;
        store.requests += 1;
        RATE_LIMIT.saturating_sub(store.requests)
    };
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(RATE_LIMIT));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(RATE_RESET));
    response
}

// --- issues ---

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub state: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// `Link` header for a page window, or `None` when everything fits on one
/// page.
fn link_header(headers: &HeaderMap, uri: &Uri, page: u64, per_page: u64, total: u64) -> Option<String> {
    let last = total.div_ceil(per_page).max(1);
    if last == 1 {
        return None;
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let link = |p: u64, rel: &str| {
        format!(
            "<http://{host}{}?page={p}&per_page={per_page}>; rel=\"{rel}\"",
            uri.path()
        )
    };
    let mut links = Vec::new();
    if page < last {
        links.push(link(page + 1, "next"));
        links.push(link(last, "last"));
    }
    if page > 1 {
        links.push(link(1, "first"));
        links.push(link(page - 1, "prev"));
    }
    Some(links.join(", "))
}

async fn list_issues(
    State(db): State<Db>,
    Path((owner, repo)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let repository = format!("{owner}/{repo}");
    let store = db.read().await;
    let matching: Vec<&Issue> = store
        .issues
        .iter()
        .filter(|i| i.repository == repository)
        .filter(|i| params.state.as_deref().is_none_or(|s| s == "all" || i.state == s))
        .collect();

    let per_page = params.per_page.unwrap_or(30).clamp(1, 100);
    let page = params.page.unwrap_or(1).max(1);
    let items: Vec<Issue> = matching
        .iter()
        .skip(((page - 1) * per_page) as usize)
        .take(per_page as usize)
        .map(|i| (*i).clone())
        .collect();

    let mut response = Json(items).into_response();
    if let Some(link) = link_header(&headers, &uri, page, per_page, matching.len() as u64) {
        if let Ok(value) = HeaderValue::from_str(&link) {
            response.headers_mut().insert(header::LINK, value);
        }
    }
    response
}

fn etag(issue: &Issue) -> String {
    format!("\"issue-{}-{}\"", issue.number, issue.version)
}

async fn get_issue(
    State(db): State<Db>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
    headers: HeaderMap,
) -> Response {
    let repository = format!("{owner}/{repo}");
    let store = db.read().await;
    let Some(issue) = store
        .issues
        .iter()
        .find(|i| i.repository == repository && i.number == number)
    else {
        return not_found();
    };

    let tag = etag(issue);
    let fresh = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == tag);
    if fresh {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, tag)]).into_response();
    }
    ([(header::ETAG, tag)], Json(issue.clone())).into_response()
}

async fn create_issue(
    State(db): State<Db>,
    Path((owner, repo)): Path<(String, String)>,
    Json(input): Json<Value>,
) -> Response {
    let Some(title) = input["title"].as_str().filter(|t| !t.is_empty()) else {
        return validation_failed("Issue", "title", "missing_field");
    };
    let repository = format!("{owner}/{repo}");
    let mut store = db.write().await;
    let number = store
        .issues
        .iter()
        .filter(|i| i.repository == repository)
        .map(|i| i.number)
        .max()
        .unwrap_or(0)
        + 1;
    let issue = Issue {
        number,
        repository,
        title: title.to_string(),
        body: input["body"].as_str().map(str::to_string),
        state: "open".to_string(),
        labels: input["labels"]
            .as_array()
            .map(|l| l.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        version: 0,
    };
    store.issues.push(issue.clone());
    (StatusCode::CREATED, Json(issue)).into_response()
}

async fn edit_issue(
    State(db): State<Db>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
    Json(input): Json<Value>,
) -> Response {
    let repository = format!("{owner}/{repo}");
    let mut store = db.write().await;
    let Some(issue) = store
        .issues
        .iter_mut()
        .find(|i| i.repository == repository && i.number == number)
    else {
        return not_found();
    };
    if let Some(state) = input["state"].as_str() {
        if state != "open" && state != "closed" {
            return validation_failed("Issue", "state", "invalid");
        }
        issue.state = state.to_string();
    }
    if let Some(title) = input["title"].as_str() {
        issue.title = title.to_string();
    }
    if let Some(body) = input["body"].as_str() {
        issue.body = Some(body.to_string());
    }
    issue.version += 1;
    Json(issue.clone()).into_response()
}

// --- repositories ---

async fn list_repos(State(db): State<Db>) -> Json<Vec<Repo>> {
    Json(db.read().await.repos.clone())
}

async fn get_repo(State(db): State<Db>, Path((owner, repo)): Path<(String, String)>) -> Response {
    let full_name = format!("{owner}/{repo}");
    let store = db.read().await;
    match store.repos.iter().find(|r| r.full_name == full_name) {
        Some(repo) => Json(repo.clone()).into_response(),
        None => not_found(),
    }
}

async fn create_repo(State(db): State<Db>, Json(input): Json<Value>) -> Response {
    let Some(name) = input["name"].as_str().filter(|n| !n.is_empty()) else {
        return validation_failed("Repository", "name", "missing_field");
    };
    let mut store = db.write().await;
    if store.repos.iter().any(|r| r.name == name) {
        return validation_failed("Repository", "name", "already_exists");
    }
    let repo = Repo {
        id: store.repos.len() as u64 + 1,
        name: name.to_string(),
        full_name: format!("{SEED_OWNER}/{name}"),
        description: input["description"].as_str().map(str::to_string),
        private: input["private"].as_bool().unwrap_or(false),
        has_issues: input["has_issues"].as_bool().unwrap_or(true),
    };
    store.repos.push(repo.clone());
    let location = format!("/repos/{}", repo.full_name);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(repo)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AssetParams {
    pub name: Option<String>,
    pub label: Option<String>,
}

async fn upload_asset(
    State(db): State<Db>,
    Query(params): Query<AssetParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(name) = params.name.filter(|n| !n.is_empty()) else {
        return validation_failed("ReleaseAsset", "name", "missing_field");
    };
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return error(StatusCode::BAD_REQUEST, "Content-Type header is required");
    };
    let mut store = db.write().await;
    let asset = Asset {
        id: store.assets.len() as u64 + 1,
        name,
        label: params.label,
        content_type: content_type.to_string(),
        size: body.len(),
    };
    store.assets.push(asset.clone());
    (StatusCode::CREATED, Json(asset)).into_response()
}

// --- gists ---

async fn list_gists(State(db): State<Db>) -> Json<Vec<Gist>> {
    Json(db.read().await.gists.values().cloned().collect())
}

async fn create_gist(State(db): State<Db>, Json(input): Json<Value>) -> Response {
    if !input["files"].is_object() {
        return validation_failed("Gist", "files", "missing_field");
    }
    let gist = Gist {
        id: Uuid::new_v4(),
        description: input["description"].as_str().map(str::to_string),
        public: input["public"].as_bool().unwrap_or(false),
        files: input["files"].clone(),
    };
    db.write().await.gists.insert(gist.id, gist.clone());
    (StatusCode::CREATED, Json(gist)).into_response()
}

async fn get_gist(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.read().await.gists.get(&id) {
        Some(gist) => Json(gist.clone()).into_response(),
        None => not_found(),
    }
}

async fn delete_gist(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    match db.write().await.gists.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

// --- markdown ---

/// Headings and paragraphs only.
fn render(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| match block.strip_prefix("# ") {
            Some(heading) => format!("<h1>{heading}</h1>"),
            None => format!("<p>{block}</p>"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn html(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/html;charset=utf-8")], body).into_response()
}

async fn render_markdown(Json(input): Json<Value>) -> Response {
    match input["text"].as_str() {
        Some(text) => html(render(text)),
        None => validation_failed("Markdown", "text", "missing_field"),
    }
}

async fn render_markdown_raw(headers: HeaderMap, body: String) -> Response {
    let plain = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain") || v.starts_with("text/x-markdown"));
    if !plain {
        return error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
    }
    html(render(&body))
}

// --- search ---

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// Bare words must appear in the title; `state:` and `label:` qualifiers
/// filter on those fields.
async fn search_issues(State(db): State<Db>, Query(params): Query<SearchParams>) -> Json<Value> {
    let store = db.read().await;
    let items: Vec<&Issue> = store
        .issues
        .iter()
        .filter(|issue| {
            params.q.split_whitespace().all(|term| match term.split_once(':') {
                Some(("state", state)) => issue.state == state,
                Some(("label", label)) => issue.labels.iter().any(|l| l == label),
                Some(_) => true,
                None => issue.title.to_lowercase().contains(&term.to_lowercase()),
            })
        })
        .collect();
    Json(json!({
        "total_count": items.len(),
        "incomplete_results": false,
        "items": items,
    }))
}

// --- users ---

async fn current_user(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let authorized = match authorization {
        Some(value) => value.starts_with("token ") || value.starts_with("Basic "),
        None => query.contains_key("access_token"),
    };
    if !authorized {
        return error(StatusCode::UNAUTHORIZED, "Requires authentication");
    }
    (
        [("x-oauth-scopes", "repo, user")],
        Json(json!({ "login": SEED_OWNER, "id": 1 })),
    )
        .into_response()
}

async fn get_user(Path(user): Path<String>) -> Json<Value> {
    Json(json!({ "login": user }))
}

async fn rate_limit_status(State(db): State<Db>) -> Json<Value> {
    let remaining = RATE_LIMIT.saturating_sub(db.read().await.requests);
    let core = json!({ "limit": RATE_LIMIT, "remaining": remaining, "reset": RATE_RESET });
    Json(json!({ "resources": { "core": core.clone() }, "rate": core }))
}

async fn meta() -> Json<Value> {
    Json(json!({ "verifiable_password_authentication": true }))
}
