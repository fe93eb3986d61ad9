//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: reads the request into a
//! [`PageRequest`], matches it against the route table and dispatches to a
//! page handler. Routes are method-agnostic; `HEAD` gets the same response
//! without a body.

use crate::config::AppState;
use crate::handler::pages;
use crate::http::{self, FormValues, RequestForm};
use crate::logger::{self, AccessLogEntry};
use crate::routing::{self, PageRoute, Route, Verb};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fully read request, independent of the connection it arrived on
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub method: Method,
    /// Path as sent by the client, still percent-encoded
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl PageRequest {
    fn from_parts(parts: &Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(ToString::to_string),
            content_type: parts
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
            body,
        }
    }

    /// Form fields from the query string and, for urlencoded
    /// POST/PUT/PATCH bodies, from the body
    pub fn form(&self) -> RequestForm {
        let query = self
            .query
            .as_deref()
            .map(|q| FormValues::parse(q.as_bytes()))
            .unwrap_or_default();
        let body_allowed = matches!(self.method, Method::POST | Method::PUT | Method::PATCH);
        let is_urlencoded = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.trim_start().starts_with(FORM_CONTENT_TYPE));

        let body = if body_allowed && is_urlencoded {
            FormValues::parse(&self.body)
        } else {
            FormValues::default()
        };
        RequestForm { body, query }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let started = Instant::now();
    let is_head = req.method() == Method::HEAD;
    let mut entry = access_entry(&req, peer_addr);

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let mut response = match read_page_request(req, state.config.http.max_body_size).await {
        Ok(page_req) => dispatch(&page_req, &state).await,
        Err(resp) => resp,
    };

    if let Ok(server) = state.config.http.server_name.parse() {
        response.headers_mut().insert("Server", server);
    }

    let body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    if is_head {
        *response.body_mut() = Full::new(Bytes::new());
    }

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = if is_head { 0 } else { body_bytes };
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route a read request to its page handler
pub async fn dispatch(req: &PageRequest, state: &AppState) -> Response<Full<Bytes>> {
    let Some(path) = http::percent_decode_path(&req.path) else {
        return http::build_404_response();
    };

    match routing::match_route(&path) {
        Route::Root => pages::root(state),
        Route::Menu => pages::menu(state).await,
        Route::New => pages::new_page(&req.form()),
        Route::Page(PageRoute { verb, title }) => match verb {
            Verb::View => pages::view(&title, state).await,
            Verb::Edit => pages::edit(&title, state).await,
            Verb::Save => pages::save(&title, &req.form(), state).await,
            Verb::Delete => pages::delete(&title, state).await,
        },
        Route::NotFound => http::build_404_response(),
    }
}

/// Collect the body, enforcing `max_body_size`
async fn read_page_request<B>(
    req: Request<B>,
    max_body_size: u64,
) -> Result<PageRequest, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return Err(resp);
    }

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(PageRequest::from_parts(&parts, collected.to_bytes())),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!(
                "Request body exceeded {max_body_size} bytes while reading"
            ));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::build_400_response("Failed to read request body"))
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::store::Page;
    use crate::templates::{Render, RenderData, RenderError, TemplateName};
    use minijinja::ErrorKind;
    use hyper::StatusCode;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> AppState {
        AppState::new(&test_config(dir.path())).unwrap()
    }

    fn request(method: Method, target: &str) -> PageRequest {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target, None),
        };
        PageRequest {
            method,
            path: path.to_string(),
            query,
            content_type: None,
            body: Bytes::new(),
        }
    }

    fn post_form(target: &str, body: &str) -> PageRequest {
        PageRequest {
            content_type: Some(FORM_CONTENT_TYPE.to_string()),
            body: Bytes::from(body.to_string()),
            ..request(Method::POST, target)
        }
    }

    async fn body_text(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(resp: &Response<Full<Bytes>>) -> &str {
        resp.headers()["Location"].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_create_edit_view_list_delete_flow() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let resp = dispatch(&post_form("/new", "name=Alpha"), &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/edit/Alpha");

        let resp = dispatch(&post_form("/save/Alpha", "body=Hello"), &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/view/Alpha");

        let resp = dispatch(&request(Method::GET, "/view/Alpha"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Hello"));

        let resp = dispatch(&request(Method::GET, "/menu"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Alpha"));

        let resp = dispatch(&request(Method::GET, "/delete/Alpha"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Alpha"));

        let resp = dispatch(&request(Method::GET, "/view/Alpha"), &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/edit/Alpha");
    }

    #[tokio::test]
    async fn test_disallowed_title_is_not_found_and_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        for target in ["/save/Bad.Name", "/save/..%2Fsecret", "/view/a%2Fb", "/edit/", "/nope"] {
            let resp = dispatch(&post_form(target, "body=x"), &state).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{target}");
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_titles_with_spaces_round_trip() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let resp = dispatch(&post_form("/new", "name=My+Page"), &state).await;
        assert_eq!(location(&resp), "/edit/My%20Page");

        let resp = dispatch(&post_form("/save/My%20Page", "body=line+one%0Aline+two"), &state).await;
        assert_eq!(location(&resp), "/view/My%20Page");
        assert_eq!(
            std::fs::read(dir.path().join("My Page.txt")).unwrap(),
            b"line one\nline two"
        );
    }

    #[tokio::test]
    async fn test_edit_missing_page_shows_empty_editor() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let resp = dispatch(&request(Method::GET, "/edit/Fresh"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("Editing Fresh"));
        assert!(html.contains("></textarea>"));
    }

    #[tokio::test]
    async fn test_unreadable_page_falls_back_like_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Broken.txt")).unwrap();
        let state = state(&dir);

        let resp = dispatch(&request(Method::GET, "/view/Broken"), &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/edit/Broken");

        let resp = dispatch(&request(Method::GET, "/edit/Broken"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_save_failure_is_server_error() {
        let dir = TempDir::new().unwrap();
        // Saving over a directory cannot succeed
        std::fs::create_dir(dir.path().join("Taken.txt")).unwrap();
        let state = state(&dir);

        let resp = dispatch(&post_form("/save/Taken", "body=x"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.starts_with("write "));
    }

    #[tokio::test]
    async fn test_delete_missing_is_server_error() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let resp = dispatch(&request(Method::GET, "/delete/Ghost"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.contains("Ghost.txt"));
    }

    #[tokio::test]
    async fn test_menu_failure_is_server_error() {
        let dir = TempDir::new().unwrap();
        let state = AppState::new(&test_config(&dir.path().join("missing"))).unwrap();

        let resp = dispatch(&request(Method::GET, "/menu"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_body_field_wins_over_query() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        dispatch(&post_form("/save/Q?body=query", "body=form"), &state).await;
        assert_eq!(std::fs::read(dir.path().join("Q.txt")).unwrap(), b"form");

        // GET bodies are ignored; the query string still counts
        dispatch(&request(Method::GET, "/save/Q?body=query"), &state).await;
        assert_eq!(std::fs::read(dir.path().join("Q.txt")).unwrap(), b"query");

        // Missing field saves an empty page
        dispatch(&request(Method::GET, "/save/Q"), &state).await;
        assert_eq!(std::fs::read(dir.path().join("Q.txt")).unwrap(), b"");
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_stored_verbatim() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Doc.txt"), "earlier content").unwrap();
        let state = state(&dir);

        let resp = dispatch(&post_form("/save/Doc", "body=caf%E9"), &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(std::fs::read(dir.path().join("Doc.txt")).unwrap(), b"caf\xe9");

        // Unescaped bytes from the wire are kept as well
        let raw = PageRequest {
            body: Bytes::from_static(b"body=ok\xff\xfe"),
            ..post_form("/save/Raw", "")
        };
        let resp = dispatch(&raw, &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(std::fs::read(dir.path().join("Raw.txt")).unwrap(), b"ok\xff\xfe");
    }

    #[tokio::test]
    async fn test_non_utf8_page_views_lossily() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        dispatch(&post_form("/save/Latin", "body=caf%E9+%3Cb%3E"), &state).await;

        let resp = dispatch(&request(Method::GET, "/view/Latin"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("caf\u{fffd} &lt;b&gt;"));

        let resp = dispatch(&request(Method::GET, "/edit/Latin"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("caf\u{fffd} &lt;b&gt;</textarea>"));

        // Viewing does not rewrite the stored bytes
        assert_eq!(std::fs::read(dir.path().join("Latin.txt")).unwrap(), b"caf\xe9 <b>");
    }

    #[tokio::test]
    async fn test_new_without_name_redirects_home() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let resp = dispatch(&post_form("/new", "name="), &state).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/");
    }

    #[tokio::test]
    async fn test_root_renders_landing_page() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let resp = dispatch(&request(Method::GET, "/"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("/new"));
    }

    /// Records what it was asked to render
    struct StubRenderer;

    impl Render for StubRenderer {
        fn render(&self, name: TemplateName, data: RenderData<'_>) -> Result<String, RenderError> {
            match data {
                RenderData::None => Ok(format!("{name}")),
                RenderData::Page(page) => Ok(format!(
                    "{name}:{}:{}",
                    page.title,
                    String::from_utf8_lossy(&page.body)
                )),
                RenderData::Titles(titles) => Ok(format!("{name}:{}", titles.join(","))),
            }
        }
    }

    /// Fails every render
    struct BrokenRenderer;

    impl Render for BrokenRenderer {
        fn render(&self, name: TemplateName, _data: RenderData<'_>) -> Result<String, RenderError> {
            Err(RenderError::new(
                name,
                minijinja::Error::new(ErrorKind::TemplateNotFound, "no templates"),
            ))
        }
    }

    #[tokio::test]
    async fn test_handlers_pass_expected_data_to_renderer() {
        let dir = TempDir::new().unwrap();
        let state = AppState::with_renderer(&test_config(dir.path()), Arc::new(StubRenderer));
        state.store.save(&Page::new("Beta", "b")).await.unwrap();
        state.store.save(&Page::new("Alpha", "a")).await.unwrap();

        let cases = [
            ("/", "root.html"),
            ("/menu", "menu.html:Alpha,Beta"),
            ("/view/Alpha", "view.html:Alpha:a"),
            ("/edit/Gamma", "edit.html:Gamma:"),
            ("/delete/Beta", "ok.html:Beta:"),
        ];
        for (target, expected) in cases {
            let resp = dispatch(&request(Method::GET, target), &state).await;
            assert_eq!(body_text(resp).await, expected, "{target}");
        }
    }

    #[tokio::test]
    async fn test_render_failure_is_server_error() {
        let dir = TempDir::new().unwrap();
        let state = AppState::with_renderer(&test_config(dir.path()), Arc::new(BrokenRenderer));

        let resp = dispatch(&request(Method::GET, "/"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_handle_request_head_and_server_header() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(state(&dir));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = handle_request(req, Arc::clone(&state), peer).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Server"], "microwiki");
        assert!(body_text(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_handle_request_rejects_large_body() {
        let dir = TempDir::new().unwrap();
        let mut cfg = test_config(dir.path());
        cfg.http.max_body_size = 8;
        let state = Arc::new(AppState::new(&cfg).unwrap());
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let req = Request::builder()
            .method(Method::POST)
            .uri("/save/Big")
            .header("content-type", FORM_CONTENT_TYPE)
            .body(Full::new(Bytes::from("body=far+too+long")))
            .unwrap();
        let resp = handle_request(req, Arc::clone(&state), peer).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!dir.path().join("Big.txt").exists());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/save/Big")
            .header("content-length", "1000")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = handle_request(req, state, peer).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_handle_request_saves_form_post() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(state(&dir));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let req = Request::builder()
            .method(Method::POST)
            .uri("/save/Gamma")
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(Full::new(Bytes::from("body=G")))
            .unwrap();
        let resp = handle_request(req, state, peer).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(std::fs::read(dir.path().join("Gamma.txt")).unwrap(), b"G");
    }
}
