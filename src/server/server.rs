use crate::config::ServerConfig;
use crate::core::SessionStore;
use crate::device::display_host;
use crate::error::ServerStartError;
use crate::protocol::{STYLESHEET_PATH, UPLOAD_PATH};
use crate::server::handlers::{
    AppState, handle_download, handle_root, handle_stylesheet, handle_upload,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long `stop` waits for in-flight responses before aborting
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// HTTP front end serving the sessions of one [`SessionStore`]
pub struct DropServer {
    store: SessionStore,
    config: ServerConfig,
    local_addr: Option<SocketAddr>,
    handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl DropServer {
    pub fn new(store: SessionStore, config: ServerConfig) -> Self {
        Self {
            store,
            config,
            local_addr: None,
            handle: None,
            shutdown_tx: None,
        }
    }

    /// Bind and start serving in the background
    ///
    /// If the configured port is taken the next ones are tried in turn; the
    /// port actually bound is written back into the config.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerStartError> {
        if let Some(addr) = self.local_addr.filter(|_| self.is_running()) {
            return Ok(addr);
        }

        let listener = bind_with_retry(&self.config.host, self.config.port).await?;
        let local_addr = listener.local_addr().map_err(|source| ServerStartError::Bind {
            addr: format!("{}:{}", self.config.host, self.config.port),
            source,
        })?;
        self.config.port = local_addr.port();

        let router = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        self.local_addr = Some(local_addr);

        tracing::info!("Server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Stop accepting connections and wait briefly for open responses
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("Server did not stop in time, aborting");
                handle.abort();
            }
            tracing::info!("Server stopped");
        }
        self.local_addr = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Port in use once started, the configured one before
    pub fn port(&self) -> u16 {
        self.local_addr
            .map(|addr| addr.port())
            .unwrap_or(self.config.port)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Base URL for links; a wildcard host shows the LAN address
    pub fn url(&self) -> String {
        let host = display_host(&self.config);
        if host.contains(':') {
            format!("http://[{}]:{}", host, self.port())
        } else {
            format!("http://{}:{}", host, self.port())
        }
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            store: self.store.clone(),
            config: Arc::new(self.config.clone()),
        })
    }
}

impl Drop for DropServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub(crate) fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route(STYLESHEET_PATH, get(handle_stylesheet))
        .route(UPLOAD_PATH, post(handle_upload).layer(upload_limit))
        .route("/", get(handle_root))
        .route("/{*path}", get(handle_download))
        .with_state(state)
}

/// Bind `host:port`, walking upwards while the port is in use
///
/// Port 0 asks the OS for any free port and is never retried.
pub async fn bind_with_retry(host: &str, port: u16) -> Result<TcpListener, ServerStartError> {
    let ip = resolve_host(host, port).await?;
    let mut candidate = port;

    loop {
        let addr = SocketAddr::new(ip, candidate);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if candidate != port {
                    tracing::warn!("Port {} is in use, bound {} instead", port, candidate);
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse && candidate != 0 => {
                tracing::debug!("Port {} is in use", candidate);
                candidate = candidate
                    .checked_add(1)
                    .ok_or(ServerStartError::NoFreePort { from: port })?;
            }
            Err(source) => {
                return Err(ServerStartError::Bind {
                    addr: addr.to_string(),
                    source,
                });
            }
        }
    }
}

async fn resolve_host(host: &str, port: u16) -> Result<IpAddr, ServerStartError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let bind_error = |source| ServerStartError::Bind {
        addr: format!("{}:{}", host, port),
        source,
    };
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(bind_error)?;
    addrs.next().map(|addr| addr.ip()).ok_or_else(|| {
        bind_error(std::io::Error::new(
            ErrorKind::NotFound,
            "host resolved to no addresses",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConsumptionPolicy, ServerConfigBuilder, Session, StoreConfig};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use bytes::Bytes;
    use std::io::Read;
    use tower::ServiceExt;

    const BOUNDARY: &str = "drop-test-boundary";

    fn test_state(config: ServerConfig, policy: ConsumptionPolicy) -> AppState {
        AppState {
            store: SessionStore::with_config(StoreConfig {
                policy,
                ..StoreConfig::default()
            }),
            config: Arc::new(config),
        }
    }

    fn live_session(id: &str, name: &str, data: &'static [u8]) -> Session {
        Session::new(
            id,
            name,
            "text/plain",
            Bytes::from_static(data),
            chrono::Utc::now() + chrono::Duration::minutes(5),
        )
    }

    async fn send(state: &AppState, method: &str, uri: &str) -> Response {
        create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn multipart_body(files: &[(&str, &str)], directory: Option<&str>) -> String {
        let mut body = String::new();
        for (name, contents) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n"
            ));
        }
        if let Some(dir) = directory {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"directoryName\"\r\n\r\n{dir}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    async fn upload(state: &AppState, body: String) -> Response {
        create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(UPLOAD_PATH)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_without_session_renders_landing_page() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);

        let response = send(&state, "GET", "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"data-drop-root="1""#));
        assert!(html.contains("data-upload-card"));
    }

    #[tokio::test]
    async fn test_root_ignores_root_session_unless_serving_at_root() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);
        state.store.insert(live_session("", "root.txt", b"root"));

        let html = body_text(send(&state, "GET", "/").await).await;
        assert!(html.contains(r#"data-drop-root="1""#));
        assert!(!html.contains("root.txt"));
    }

    #[tokio::test]
    async fn test_root_serves_root_slot() {
        let config = ServerConfigBuilder::new(0).serve_at_root().build();
        let state = test_state(config, ConsumptionPolicy::MultiUse);
        state.store.insert(live_session("", "root.txt", b"root"));

        let html = body_text(send(&state, "GET", "/").await).await;
        assert!(html.contains("root.txt"));
        assert!(html.contains(r#"href="/?download=1""#));

        let response = send(&state, "GET", "/?download=1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "root");
    }

    #[tokio::test]
    async fn test_interstitial_does_not_consume() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::SingleUse);
        state
            .store
            .insert(live_session("calm-moon-512", "notes.txt", b"hello"));

        for _ in 0..2 {
            let response = send(&state, "GET", "/calm-moon-512").await;
            assert_eq!(response.status(), StatusCode::OK);
            let html = body_text(response).await;
            assert!(html.contains("notes.txt"));
            assert!(html.contains(r#"href="/calm-moon-512?download=1""#));
        }
        let session = state.store.get_session("calm-moon-512").unwrap();
        assert_eq!(session.download_count, 0);
    }

    #[tokio::test]
    async fn test_download_headers_and_body() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);
        state
            .store
            .insert(live_session("calm-moon-512", "notes.txt", b"hello"));

        let response = send(&state, "GET", "/calm-moon-512?download=1").await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"notes.txt\""
        );
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert_eq!(body_text(response).await, "hello");

        let session = state.store.get_session("calm-moon-512").unwrap();
        assert_eq!(session.download_count, 1);
    }

    #[tokio::test]
    async fn test_nested_path_uses_last_segment() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);
        state
            .store
            .insert(live_session("calm-moon-512", "notes.txt", b"hello"));

        let response = send(&state, "GET", "/anything/calm-moon-512/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_head_does_not_count_download() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::SingleUse);
        state
            .store
            .insert(live_session("calm-moon-512", "notes.txt", b"hello"));

        let response = send(&state, "HEAD", "/calm-moon-512?download=1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.store.get_session("calm-moon-512").is_some());
    }

    #[tokio::test]
    async fn test_single_use_second_download_is_not_found() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::SingleUse);
        state
            .store
            .insert(live_session("calm-moon-512", "notes.txt", b"hello"));

        let first = send(&state, "GET", "/calm-moon-512?download=1").await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = send(&state, "GET", "/calm-moon-512?download=1").await;
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_session_is_gone() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);
        state.store.insert(Session::new(
            "old-fox-100",
            "old.txt",
            "text/plain",
            Bytes::from_static(b"old"),
            chrono::Utc::now() - chrono::Duration::seconds(1),
        ));

        let response = send(&state, "GET", "/old-fox-100").await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert!(body_text(response).await.contains("File has expired."));

        let response = send(&state, "GET", "/old-fox-100?download=1").await;
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);

        let response = send(&state, "GET", "/no-such-drop").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("File not found or expired."));
    }

    #[tokio::test]
    async fn test_invalid_percent_encoding_is_not_found() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);

        let response = send(&state, "GET", "/%FF").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&state, "GET", "/nested/%C3%28?download=1").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_to_session_path_is_rejected() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);
        state
            .store
            .insert(live_session("calm-moon-512", "notes.txt", b"hello"));

        let response = send(&state, "POST", "/calm-moon-512").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_stylesheet_content_type() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);

        let response = send(&state, "GET", STYLESHEET_PATH).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/css; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_upload_single_file() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);

        let body = multipart_body(&[("hello.txt", "hello from upload")], None);
        let response = upload(&state, body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["fileName"], "hello.txt");
        let slug = json["slug"].as_str().unwrap().to_string();
        assert!(!slug.is_empty());
        assert!(json["expiresAt"].is_string());

        let response = send(&state, "GET", &format!("/{slug}?download=1")).await;
        assert_eq!(body_text(response).await, "hello from upload");
    }

    #[tokio::test]
    async fn test_upload_directory_is_zipped() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);
        let body = multipart_body(
            &[
                ("project/index.js", "console.log('index');"),
                ("project/src/main.js", "console.log('main');"),
            ],
            Some("project"),
        );

        let response = upload(&state, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["fileName"], "project.zip");
        let slug = json["slug"].as_str().unwrap();

        let response = send(&state, "GET", &format!("/{slug}?download=1")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut main = String::new();
        archive
            .by_name("src/main.js")
            .unwrap()
            .read_to_string(&mut main)
            .unwrap();
        assert_eq!(main, "console.log('main');");
        assert!(archive.by_name("index.js").is_ok());
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let state = test_state(ServerConfigBuilder::new(0).build(), ConsumptionPolicy::MultiUse);

        let response = upload(&state, multipart_body(&[], Some("project"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_upload_disabled() {
        let config = ServerConfigBuilder::new(0).disable_uploads().build();
        let state = test_state(config, ConsumptionPolicy::MultiUse);

        let response = upload(&state, multipart_body(&[("a.txt", "a")], None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let config = ServerConfigBuilder::new(0).max_upload_bytes(64).build();
        let state = test_state(config, ConsumptionPolicy::MultiUse);

        let big = "x".repeat(4096);
        let response = upload(&state, multipart_body(&[("big.txt", big.as_str())], None)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_server_round_trip_over_http() {
        let store = SessionStore::new();
        store.insert(live_session("calm-moon-512", "notes.txt", b"hello over tcp"));

        let config = ServerConfigBuilder::new(0).loopback().build();
        let mut server = DropServer::new(store, config);
        let addr = server.start().await.unwrap();
        assert!(server.is_running());
        assert_ne!(server.port(), 0);
        assert_eq!(server.url(), format!("http://127.0.0.1:{}", addr.port()));

        let client = reqwest::Client::new();
        let page = client
            .get(format!("{}/calm-moon-512", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(page.status(), reqwest::StatusCode::OK);
        assert!(page.text().await.unwrap().contains("notes.txt"));

        let file = client
            .get(format!("{}/calm-moon-512?download=1", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(file.text().await.unwrap(), "hello over tcp");

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"uploaded".to_vec()).file_name("up.txt"),
        );
        let uploaded: serde_json::Value = client
            .post(format!("{}{}", server.url(), UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(uploaded["fileName"], "up.txt");
        let slug = uploaded["slug"].as_str().unwrap();
        assert!(server.store().get_session(slug).is_some());

        server.stop().await;
        assert!(!server.is_running());
        let fresh = reqwest::Client::new();
        assert!(fresh.get(format!("http://{}/", addr)).send().await.is_err());
    }

    #[tokio::test]
    async fn test_start_moves_past_busy_port() {
        let busy = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let busy_port = busy.local_addr().unwrap().port();

        let config = ServerConfigBuilder::new(busy_port).loopback().build();
        let mut server = DropServer::new(SessionStore::new(), config);
        server.start().await.unwrap();

        assert!(server.port() > busy_port);
        assert_eq!(server.config().port, server.port());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_reports_unusable_host() {
        let err = bind_with_retry("203.0.113.77", 0).await.unwrap_err();
        assert!(matches!(err, ServerStartError::Bind { .. }));
    }
}
