//! Request handling of the dev server router.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use fob_dev_server::{
    DevServer, DevServerHandle, HMR_CLIENT_PATH, HmrChannel, build_router,
};
use fob_hmr::{
    AssetServer, Bundle, ChannelOptions, Diagnostic, MemoryBundleGraph, NativeFileSystem,
    ServerOptions, TracingLogger, UpdateChannel,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct Fixture {
    _dir: TempDir,
    server: DevServer,
}

impl Fixture {
    fn new(public_url: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        write(root, "dist/index.js", "console.log('hi');");
        write(root, "dist/app/index.html", "<html><body><h1>App</h1></body></html>");
        write(root, "dist/styles/main.css", "body { color: red; }");
        write(root, "public/robots.txt", "User-agent: *");

        let fs = Arc::new(NativeFileSystem::new());
        let options = ServerOptions {
            port: 1234,
            host: "127.0.0.1".into(),
            project_root: root.to_path_buf(),
            cache_dir: root.join(".fob-cache"),
            dist_dir: root.join("dist"),
            public_url: public_url.into(),
            input_fs: fs.clone(),
            output_fs: fs,
            logger: Arc::new(TracingLogger::new()),
        };

        Self {
            _dir: dir,
            server: DevServer::new(options),
        }
    }

    fn router(&self) -> Router {
        build_router(self.server.state().clone())
    }

    fn complete_build_with_entry(&self) {
        let mut graph = MemoryBundleGraph::new();
        graph.add_bundle(Bundle {
            id: "app/index.html".into(),
            bundle_type: "html".into(),
            name: "app/index.html".into(),
            is_entry: true,
        });
        self.server.build_success(Arc::new(graph));
    }
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, contents).expect("write");
}

async fn get(router: Router, uri: &str) -> Response {
    router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("infallible")
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn serves_output_file_without_caching() {
    let fixture = Fixture::new("/");

    let response = get(fixture.router(), "/styles/main.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(body_string(response).await, "body { color: red; }");
}

#[tokio::test]
async fn falls_back_to_public_dir() {
    let fixture = Fixture::new("/");

    let response = get(fixture.router(), "/robots.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "User-agent: *");
}

#[tokio::test]
async fn unknown_file_is_not_found() {
    let fixture = Fixture::new("/");

    let response = get(fixture.router(), "/missing.js").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn extensionless_path_serves_html_entry() {
    let fixture = Fixture::new("/");
    fixture.complete_build_with_entry();

    for uri in ["/", "/about/team"] {
        let response = get(fixture.router(), uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert!(body_string(response).await.contains("<h1>App</h1>"));
    }
}

#[tokio::test]
async fn extensionless_path_without_entry_is_not_found() {
    let fixture = Fixture::new("/");

    let response = get(fixture.router(), "/about").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strips_public_url_prefix() {
    let fixture = Fixture::new("/static/");

    let inside = get(fixture.router(), "/static/index.js").await;
    assert_eq!(inside.status(), StatusCode::OK);
    assert_eq!(
        inside.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );

    let outside = get(fixture.router(), "/index.js").await;
    assert_eq!(outside.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_build_shows_overlay_until_next_success() {
    let fixture = Fixture::new("/");
    fixture
        .server
        .build_error(&[Diagnostic::new("Unexpected token <").with_file("src/app.js")]);

    let response = get(fixture.router(), "/index.js").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let html = body_string(response).await;
    assert!(html.contains("Unexpected token &lt;"));
    assert!(html.contains("src/app.js"));

    fixture.complete_build_with_entry();
    let response = get(fixture.router(), "/index.js").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_waits_for_running_build() {
    let fixture = Fixture::new("/");
    fixture.server.build_start();

    let pending = tokio::spawn(get(fixture.router(), "/index.js"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());

    fixture.server.build_error(&[Diagnostic::new("boom")]);

    let response = pending.await.expect("join");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn html_gets_client_script_once_channel_attaches() {
    let fixture = Fixture::new("/");

    let plain = body_string(get(fixture.router(), "/app/index.html").await).await;
    assert!(!plain.contains(HMR_CLIENT_PATH));

    let channel = HmrChannel::new(ChannelOptions {
        port: 1234,
        host: "127.0.0.1".into(),
        dev_server: Some(DevServerHandle {
            addr: "127.0.0.1:1234".parse().expect("addr"),
            hub: fixture.server.state().hub().clone(),
        }),
        logger: Arc::new(TracingLogger::new()),
    });
    channel.start().await.expect("attach");

    let injected = body_string(get(fixture.router(), "/app/index.html").await).await;
    assert!(injected.contains(HMR_CLIENT_PATH));

    channel.stop().await.expect("detach");
    let plain = body_string(get(fixture.router(), "/app/index.html").await).await;
    assert!(!plain.contains(HMR_CLIENT_PATH));
}

#[tokio::test]
async fn client_script_is_served() {
    let fixture = Fixture::new("/");

    let response = get(fixture.router(), HMR_CLIENT_PATH).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
    assert!(body_string(response).await.contains("EventSource"));
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let fixture = Fixture::new("/");

    let response = fixture
        .router()
        .oneshot(
            Request::builder()
                .uri("/index.js")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("infallible");

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
