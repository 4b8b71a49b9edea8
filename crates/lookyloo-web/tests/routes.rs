//! Request/response contracts of the web front-end, checked against an
//! in-memory capture engine.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use lookyloo_common::error::{LookylooError, Result};
use lookyloo_common::{CaptureTree, HostNode, LoadedTree, ReportCache, ScrapeRequest, UrlNode};
use lookyloo_engine::{CaptureEngine, UserAgents};
use lookyloo_web::{
    router::build_router,
    state::{AppState, BUNDLED_STATIC_DIR},
};

const LISTED: &str = "11111111-1111-1111-1111-111111111111";
const HIDDEN: &str = "22222222-2222-2222-2222-222222222222";
const BROKEN: &str = "33333333-3333-3333-3333-333333333333";

struct FakeEngine {
    home: tempfile::TempDir,
    submitted: Mutex<Vec<ScrapeRequest>>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            home: tempfile::tempdir().unwrap(),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn dir(&self, uuid: &str) -> PathBuf {
        self.home.path().join(uuid)
    }

    fn tree() -> CaptureTree {
        let url = |uuid: &str, name: &str, filename: &str, body: Option<&[u8]>, hash: Option<&str>| UrlNode {
            uuid: uuid.into(),
            name: name.into(),
            hostname: "example.com".into(),
            filename: filename.into(),
            status: Some(200),
            mimetype: None,
            body: body.map(<[u8]>::to_vec),
            body_hash: hash.map(String::from),
        };
        CaptureTree {
            uuid: LISTED.into(),
            root_url: "https://example.com/".into(),
            start_time: "2020-04-01T10:00:00Z".into(),
            user_agent: "Mozilla/5.0 Test".into(),
            host_nodes: vec![HostNode {
                uuid: "host-1".into(),
                name: "example.com".into(),
                urls: vec![
                    url("url-page", "https://example.com/", "file.bin", Some(b"<html></html>"), None),
                    url("url-js", "https://example.com/jquery.js", "jquery.js", Some(b"var x;"), Some("abcd")),
                    url("url-empty", "https://example.com/favicon.ico", "favicon.ico", None, None),
                ],
            }],
        }
    }
}

#[async_trait]
impl CaptureEngine for FakeEngine {
    async fn enqueue_scrape(&self, request: ScrapeRequest) -> Result<Uuid> {
        self.submitted.lock().unwrap().push(request);
        Ok(Uuid::new_v4())
    }

    async fn scrape(&self, request: ScrapeRequest) -> Result<Uuid> {
        if request.url.starts_with("ftp://") {
            return Err(LookylooError::InvalidUrl(request.url));
        }
        self.submitted.lock().unwrap().push(request);
        Ok(Uuid::parse_str(LISTED).unwrap())
    }

    async fn lookup_report_dir(&self, uuid: &str) -> Result<Option<PathBuf>> {
        Ok([LISTED, HIDDEN, BROKEN].contains(&uuid).then(|| self.dir(uuid)))
    }

    async fn load_tree(&self, report_dir: &Path) -> Result<LoadedTree> {
        if report_dir == self.dir(BROKEN) {
            return Err(LookylooError::NoValidHarFile(report_dir.display().to_string()));
        }
        let tree = Self::tree();
        let snapshot_path = self.home.path().join(format!("lookyloo-{}.json", Uuid::new_v4()));
        tree.write_snapshot(&snapshot_path).await?;
        Ok(LoadedTree {
            snapshot_path,
            tree_json: tree.to_tree_json(),
            start_time: tree.start_time,
            user_agent: tree.user_agent,
            root_url: tree.root_url,
            meta: json!({}),
        })
    }

    async fn sane_js_query(&self, body_hash: &str) -> Value {
        if body_hash == "abcd" {
            json!({"response": ["jquery|3.4.1|jquery.min.js"]})
        } else {
            json!({})
        }
    }

    async fn cleanup_old_tmpfiles(&self) -> Result<usize> {
        Ok(0)
    }

    async fn load_image(&self, _report_dir: &Path) -> Result<Vec<u8>> {
        Ok(b"\x89PNG\r\n".to_vec())
    }

    async fn report_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(vec![self.dir(LISTED), self.dir(HIDDEN), self.dir(BROKEN)])
    }

    async fn report_cache(&self, report_dir: &Path) -> Result<Option<ReportCache>> {
        let cache = |uuid: &str, title: &str, no_index: bool| ReportCache {
            uuid: uuid.into(),
            title: title.into(),
            timestamp: "2020-04-01T10:00:00Z".into(),
            url: "https://example.com/".into(),
            no_index,
        };
        Ok(if report_dir == self.dir(LISTED) {
            Some(cache(LISTED, "Listed capture", false))
        } else if report_dir == self.dir(HIDDEN) {
            Some(cache(HIDDEN, "Hidden capture", true))
        } else {
            None
        })
    }

    async fn user_agents(&self) -> UserAgents {
        UserAgents::builtin()
    }

    async fn update_user_agents(&self) {}
}

fn app() -> (Router, Arc<FakeEngine>) {
    let engine = Arc::new(FakeEngine::new());
    let state = AppState::new(engine.clone(), &[42u8; 64], PathBuf::from(BUNDLED_STATIC_DIR)).unwrap();
    (build_router(state), engine)
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn header_str<'a>(resp: &'a Response, name: header::HeaderName) -> &'a str {
    resp.headers().get(name).unwrap().to_str().unwrap()
}

/// Load the listed tree and return the session cookie to send back.
async fn load_session(app: &Router) -> String {
    let resp = get(app, &format!("/tree/{LISTED}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    header_str(&resp, header::SET_COOKIE)
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn single_zip_entry(archive: Vec<u8>) -> (String, String) {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(zip.len(), 1);
    let mut entry = zip.by_index(0).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    (entry.name().to_string(), content)
}

#[tokio::test]
async fn submit_returns_identifier() {
    let (app, engine) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .body(Body::from(r#"{"url": "https://circl.lu", "depth": 2}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(!body.is_empty());
    assert!(Uuid::parse_str(&body).is_ok());

    let submitted = engine.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].url, "https://circl.lu");
    assert_eq!(submitted[0].depth, 2);
}

#[tokio::test]
async fn submit_accepts_float_depth() {
    let (app, engine) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .body(Body::from(r#"{"url": "https://circl.lu", "depth": 2.0}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(engine.submitted.lock().unwrap()[0].depth, 2);
}

#[tokio::test]
async fn submit_rejects_malformed_json() {
    let (app, _) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/submit")
                .body(Body::from("url=https://circl.lu"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tree_redirects_to_index() {
    let (app, _) = app();
    let resp = get(&app, "/tree/44444444-4444-4444-4444-444444444444", None).await;
    assert!(resp.status().is_redirection());
    assert_eq!(header_str(&resp, header::LOCATION), "/");
}

#[tokio::test]
async fn tree_page_renders_capture() {
    let (app, _) = app();
    let resp = get(&app, &format!("/tree/{LISTED}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_str(&resp, header::SET_COOKIE).starts_with("lookyloo="));
    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    // Autoescaping turns '/' into an entity.
    assert!(page.contains("example.com"));
    assert!(page.contains("Mozilla&#x2f;5.0 Test"));
    assert!(page.contains(&format!("/tree/{LISTED}/image")));
}

#[tokio::test]
async fn invalid_capture_renders_error_page() {
    let (app, _) = app();
    let resp = get(&app, &format!("/tree/{BROKEN}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(page.contains("No valid HAR file"));
}

#[tokio::test]
async fn url_without_body_gives_placeholder_zip() {
    let (app, _) = app();
    let cookie = load_session(&app).await;

    let resp = get(&app, "/tree/url/url-empty", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "application/zip");
    assert_eq!(
        header_str(&resp, header::CONTENT_DISPOSITION),
        "attachment; filename=\"file.zip\""
    );

    let (name, content) = single_zip_entry(body_bytes(resp).await);
    assert_eq!(name, "file.txt");
    assert_eq!(content, "Response body empty");
}

#[tokio::test]
async fn url_with_body_is_zipped_under_its_filename() {
    let (app, _) = app();
    let cookie = load_session(&app).await;

    let resp = get(&app, "/tree/url/url-js", Some(&cookie)).await;
    let (name, content) = single_zip_entry(body_bytes(resp).await);
    assert_eq!(name, "jquery.js");
    assert_eq!(content, "var x;");
}

#[tokio::test]
async fn hostname_text_lists_urls() {
    let (app, _) = app();
    let cookie = load_session(&app).await;

    let resp = get(&app, "/tree/hostname/host-1/text", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "text/markdown");
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert_eq!(
        text,
        "# URLs\n\nhttps://example.com/\nhttps://example.com/jquery.js\nhttps://example.com/favicon.ico\n"
    );
}

#[tokio::test]
async fn hostname_details_include_sanejs_matches() {
    let (app, _) = app();
    let cookie = load_session(&app).await;

    let resp = get(&app, "/tree/hostname/host-1", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let urls: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let urls = urls.as_array().unwrap();
    assert_eq!(urls.len(), 3);
    assert!(urls[0].get("body").is_none());
    assert!(urls[0].get("sane_js_details").is_none());
    assert_eq!(urls[1]["sane_js_details"][0], "jquery|3.4.1|jquery.min.js");
}

#[tokio::test]
async fn unknown_node_is_not_found() {
    let (app, _) = app();
    let cookie = load_session(&app).await;
    let resp = get(&app, "/tree/hostname/nope", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn node_details_need_a_session() {
    let (app, _) = app();
    let resp = get(&app, "/tree/hostname/host-1", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = get(&app, "/tree/url/url-js", Some("lookyloo=forged.00")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn image_download() {
    let (app, _) = app();
    let resp = get(&app, &format!("/tree/{LISTED}/image"), None).await;
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "image/png");
    assert_eq!(
        header_str(&resp, header::CONTENT_DISPOSITION),
        "attachment; filename=\"image.png\""
    );
    assert_eq!(body_bytes(resp).await, b"\x89PNG\r\n");

    let resp = get(&app, "/tree/44444444-4444-4444-4444-444444444444/image", None).await;
    assert_eq!(body_bytes(resp).await, b"Not available.");
}

#[tokio::test]
async fn index_hides_unlisted_captures() {
    let (app, _) = app();
    let cookie = load_session(&app).await;

    let resp = get(&app, "/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    // The session is cleared on the index.
    assert!(header_str(&resp, header::SET_COOKIE).starts_with("lookyloo=;"));

    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(page.contains("Listed capture"));
    assert!(page.contains(&format!("/tree/{LISTED}")));
    assert!(!page.contains("Hidden capture"));
    assert!(!page.contains(BROKEN));
}

#[tokio::test]
async fn head_on_index_acks() {
    let (app, _) = app();
    let resp = app
        .oneshot(Request::builder().method(Method::HEAD).uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn scrape_form_lists_user_agents() {
    let (app, _) = app();
    let resp = get(&app, "/scrape", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(page.contains("Windows"));
    assert!(page.contains("Firefox"));
    assert!(!page.contains("by_frequency"));
}

#[tokio::test]
async fn scrape_query_string_does_not_capture() {
    let (app, engine) = app();
    let resp = get(&app, "/scrape?url=https%3A%2F%2Fcircl.lu&depth=1", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(page.contains("action=\"/scrape\""));
    assert!(engine.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn scrape_form_post_redirects_to_tree() {
    let (app, engine) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/scrape")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("url=https%3A%2F%2Fcircl.lu&depth=1&os=Windows&user_agent="))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(resp.status().is_redirection());
    assert_eq!(header_str(&resp, header::LOCATION), format!("/tree/{LISTED}"));

    let submitted = engine.submitted.lock().unwrap();
    assert_eq!(submitted[0].os.as_deref(), Some("Windows"));
    assert!(!submitted[0].listing);
}

#[tokio::test]
async fn scrape_form_reports_bad_url() {
    let (app, _) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/scrape")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("url=ftp%3A%2F%2Fexample.com"))
                .unwrap(),
        )
        .await
        .unwrap();
    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(page.contains("Invalid URL"));
}

#[tokio::test]
async fn bundled_tree_script_is_served() {
    let (app, _) = app();
    let resp = get(&app, "/static/js/tree.js", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let script = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(script.contains("/tree/hostname/"));
}
