//! [`CockpitServer`] – the axum HTTP server of the request front-end.
//!
//! Listens on `0.0.0.0:8000` (configurable via [`CockpitServer::with_port`]).
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | `GET` | `/api/:command` | run a command (aliases included), reply with the snapshot |
//! | `POST` | `/api/upload` | store multipart field `file`, reply with its path |
//! | `GET` | `/test?delay=<ms>` | scripted integration run |
//! | `GET` | anything else | static file from the public directory |
//!
//! `/api/status`, `/api/connect` and `/api/disconnect` go through the same
//! `/api/:command` route; the command table marks them as ungated.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use lumen_kernel::Bridge;
use lumen_types::BridgeError;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{AppState, api_command, run_test, upload};

/// Default TCP port for the request front-end.
pub const DEFAULT_PORT: u16 = 8000;

const UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// HTTP server exposing the bridge's commands.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use lumen_cockpit::CockpitServer;
/// use lumen_hal::{SimConnection, SimDevice};
/// use lumen_kernel::Bridge;
///
/// #[tokio::main]
/// async fn main() {
///     let bridge = Arc::new(Bridge::new(
///         Arc::new(SimDevice::new()),
///         Arc::new(SimConnection::new()),
///         true,
///     ));
///     CockpitServer::new(bridge)
///         .with_port(8000)
///         .run_until(std::future::pending::<()>())
///         .await
///         .expect("cockpit server failed");
/// }
/// ```
pub struct CockpitServer {
    bridge: Arc<Bridge>,
    port: u16,
    public_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl CockpitServer {
    /// Create a server over `bridge` on the [`DEFAULT_PORT`], serving
    /// `public/` and storing uploads in `public/uploads/`.
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            port: DEFAULT_PORT,
            public_dir: PathBuf::from("public"),
            uploads_dir: PathBuf::from("public/uploads"),
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the static asset directory (builder-style).
    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    /// Override where uploads are stored (builder-style).
    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Build the router without binding a socket.
    pub fn router(&self) -> Router {
        let state = AppState {
            bridge: Arc::clone(&self.bridge),
            uploads_dir: self.uploads_dir.clone(),
        };
        Router::new()
            .route(
                "/api/upload",
                post(upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
            )
            .route("/api/:command", get(api_command))
            .route("/test", get(run_test))
            .fallback_service(ServeDir::new(&self.public_dir))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Server`] if the listener cannot bind or the
    /// server stops abnormally.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), BridgeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Server(format!("bind error on {addr}: {e}")))?;
        info!(%addr, public = %self.public_dir.display(), "request front-end listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| BridgeError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use lumen_hal::{Connection, SimConnection, SimDevice};
    use lumen_types::{Channel, StatusSnapshot};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "lumen-test-boundary";

    struct Fixture {
        router: Router,
        link: Arc<SimConnection>,
        dir: TempDir,
    }

    fn fixture(link: SimConnection) -> Fixture {
        let dir = tempfile::tempdir().expect("tmp dir");
        let link = Arc::new(link);
        let bridge = Arc::new(Bridge::new(Arc::new(SimDevice::new()), link.clone(), true));
        let router = CockpitServer::new(bridge)
            .with_public_dir(dir.path().join("public"))
            .with_uploads_dir(dir.path().join("public/uploads"))
            .router();
        Fixture { router, link, dir }
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn post_multipart(router: &Router, parts: &[(&str, Option<&str>, &[u8])]) -> (StatusCode, String) {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn score_request_writes_and_returns_snapshot() {
        let f = fixture(SimConnection::new().connected(true));
        let (status, body) = get(&f.router, "/api/score?red=10&blue=20").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            json!({"connected": true, "config": {"score": {"red": 10, "blue": 20}}})
        );

        let writes = f.link.decoded_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "score");
    }

    #[tokio::test]
    async fn request_without_fields_still_returns_snapshot() {
        let f = fixture(SimConnection::new());
        let (status, body) = get(&f.router, "/api/climate").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: StatusSnapshot = serde_json::from_slice(&body).unwrap();
        assert!(snapshot.connected, "auto-connect opened the link");
        assert_eq!(f.link.connect_calls(), 1);
    }

    #[tokio::test]
    async fn status_route_is_not_gated() {
        let f = fixture(SimConnection::new());
        let (status, body) = get(&f.router, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: StatusSnapshot = serde_json::from_slice(&body).unwrap();
        assert!(!snapshot.connected);
        assert_eq!(f.link.connect_calls(), 0);
    }

    #[tokio::test]
    async fn connect_and_disconnect_routes_toggle_link() {
        let f = fixture(SimConnection::new());
        let (_, body) = get(&f.router, "/api/connect").await;
        let snapshot: StatusSnapshot = serde_json::from_slice(&body).unwrap();
        assert!(snapshot.connected);

        let (_, body) = get(&f.router, "/api/disconnect").await;
        let snapshot: StatusSnapshot = serde_json::from_slice(&body).unwrap();
        assert!(!snapshot.connected);
        assert!(!f.link.is_connected());
    }

    #[tokio::test]
    async fn unknown_command_is_not_found() {
        let f = fixture(SimConnection::new().connected(true));
        let (status, body) = get(&f.router, "/api/warp").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("warp"));
        assert!(f.link.writes().is_empty());
    }

    #[tokio::test]
    async fn datetime_with_fullday_mode_writes_twice() {
        let f = fixture(SimConnection::new().connected(true));
        let (status, _) = get(&f.router, "/api/datetime?fulldayMode=true").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = f.link.decoded_writes().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["datetime", "fullday"]);
    }

    #[tokio::test]
    async fn clock_color_with_wrong_length_is_dropped() {
        let f = fixture(SimConnection::new().connected(true));
        get(&f.router, "/api/clock?color=abc&mode=4").await;
        let writes = f.link.decoded_writes();
        assert!(!writes[0].1.contains("color"));
        assert_eq!(writes[0].1.get_i64("mode"), Some(4));
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let f = fixture(SimConnection::new().connected(true));
        let (status, body) = post_multipart(&f.router, &[("note", None, &b"hello"[..])]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "No files were uploaded.");
        assert!(f.link.writes().is_empty());
    }

    #[tokio::test]
    async fn upload_without_multipart_body_is_rejected() {
        let f = fixture(SimConnection::new().connected(true));
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .body(Body::empty())
            .unwrap();
        let response = f.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(f.link.writes().is_empty());
    }

    #[tokio::test]
    async fn upload_stores_file_and_returns_its_path() {
        let f = fixture(SimConnection::new().connected(true));
        let (status, path) = post_multipart(&f.router, &[("file", Some("logo.png"), &[7u8; 32][..])]).await;
        assert_eq!(status, StatusCode::OK);
        assert!(path.ends_with("uploads/logo.png"), "{path}");
        assert_eq!(std::fs::read(&path).unwrap(), vec![7u8; 32]);
        assert!(f.link.writes().is_empty(), "upload alone never writes to the device");
    }

    #[tokio::test]
    async fn upload_that_cannot_be_stored_is_a_server_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let blocker = dir.path().join("uploads");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let link = Arc::new(SimConnection::new().connected(true));
        let bridge = Arc::new(Bridge::new(Arc::new(SimDevice::new()), link.clone(), true));
        let router = CockpitServer::new(bridge).with_uploads_dir(blocker.clone()).router();

        let (status, body) = post_multipart(&router, &[("file", Some("logo.png"), &[7u8; 4][..])]).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Upload could not be stored.");
        assert!(link.writes().is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_name_is_rejected() {
        let f = fixture(SimConnection::new().connected(true));
        let (status, body) = post_multipart(&f.router, &[("file", None, &b"raw"[..])]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Uploaded file has no usable name.");
        assert!(!f.dir.path().join("public/uploads").exists());
        assert!(f.link.writes().is_empty());
    }

    #[tokio::test]
    async fn uploaded_image_can_be_shown_with_img() {
        let f = fixture(SimConnection::new().connected(true));
        let (_, path) = post_multipart(&f.router, &[("file", Some("frame.bin"), &[1u8, 2, 3][..])]).await;

        let (status, _) = get(&f.router, &format!("/api/img?path={path}")).await;
        assert_eq!(status, StatusCode::OK);
        let writes = f.link.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].channel, Channel::Bulk);
        assert_eq!(writes[0].bytes, vec![1u8, 2, 3]);
    }

    #[tokio::test]
    async fn static_files_are_served_from_public_dir() {
        let f = fixture(SimConnection::new());
        let public = f.dir.path().join("public");
        std::fs::create_dir_all(&public).unwrap();
        std::fs::write(public.join("index.html"), "<h1>lumen</h1>").unwrap();

        let (status, body) = get(&f.router, "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>lumen</h1>");
    }

    #[tokio::test]
    async fn test_route_runs_scenario_and_returns_snapshot() {
        let f = fixture(SimConnection::new());
        let (status, body) = get(&f.router, "/test?delay=0").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: StatusSnapshot = serde_json::from_slice(&body).unwrap();
        assert!(snapshot.connected);
        assert_eq!(snapshot.config["clock"]["mode"], 6);
        assert!(f.link.decoded_writes().len() > 10);
    }
}
