use crate::config::ServerConfig;
use crate::core::file::OCTET_STREAM;
use crate::core::{ROOT_SLOT, Session, SessionStatus, SessionStore};
use crate::error::{PayloadLoadError, SessionCreateError};
use crate::loader::ZipBuilder;
use crate::protocol::{DOWNLOAD_MARKER, UploadResponse, sanitize_entry_path};
use crate::server::views;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub config: Arc<ServerConfig>,
}

pub async fn handle_stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        views::STYLESHEET,
    )
}

pub async fn handle_root(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    tracing::debug!("Request: {} /", method);

    let root_bound = !matches!(state.store.lookup(ROOT_SLOT), SessionStatus::Missing);
    if state.config.serve_at_root && root_bound {
        return serve_session(&state, ROOT_SLOT, &method, &uri, &params);
    }

    Html(views::landing_page(&state.config, state.store.now())).into_response()
}

pub async fn handle_download(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    tracing::debug!("Request: {} {}", method, uri.path());

    // raw segment: identifiers never need escaping, so anything encoded misses
    let id = uri
        .path()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string);
    match id {
        Some(id) => serve_session(&state, &id, &method, &uri, &params),
        None => handle_root(State(state), method, uri, Query(params)).await,
    }
}

fn wants_download(params: &HashMap<String, String>) -> bool {
    params
        .get(DOWNLOAD_MARKER)
        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

fn serve_session(
    state: &AppState,
    id: &str,
    method: &Method,
    uri: &Uri,
    params: &HashMap<String, String>,
) -> Response {
    let session = match state.store.lookup(id) {
        SessionStatus::Live(session) => session,
        other => return status_page(id, &other),
    };

    if !wants_download(params) {
        let href = format!("{}?{}=1", uri.path(), DOWNLOAD_MARKER);
        return Html(views::download_page(&session, &href, state.store.now())).into_response();
    }

    // HEAD never counts as a download
    if method == Method::HEAD {
        return file_response(session);
    }

    match state.store.consume_session(id) {
        Some(session) => {
            tracing::info!(
                "Serving file: {} ({} bytes)",
                session.file_name,
                session.file_size
            );
            file_response(session)
        }
        // expired or reaped between lookup and consume
        None => status_page(id, &state.store.lookup(id)),
    }
}

fn status_page(id: &str, status: &SessionStatus) -> Response {
    match status {
        SessionStatus::Expired => {
            tracing::warn!("Session expired: {}", id);
            (StatusCode::GONE, Html(views::expired_page())).into_response()
        }
        _ => {
            tracing::warn!("Session not found or expired: {}", id);
            (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
        }
    }
}

fn file_response(session: Session) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&session.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM)),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&session.file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(session.file_size));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    (headers, Body::from(session.payload)).into_response()
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == file_name {
        return format!("attachment; filename=\"{}\"", fallback);
    }

    let mut encoded = String::new();
    for byte in file_name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Upload failures, mapped onto HTTP statuses
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Uploads are disabled")]
    Disabled,

    #[error("No file part in upload")]
    NoFile,

    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Archive(#[from] PayloadLoadError),

    #[error(transparent)]
    Create(#[from] SessionCreateError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Disabled => StatusCode::NOT_FOUND,
            Self::NoFile => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::Archive(_) | Self::Create(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!("Upload rejected: {}", self);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    if !state.config.allow_uploads {
        return Err(UploadError::Disabled);
    }

    let mut files: Vec<(String, Bytes)> = Vec::new();
    let mut directory_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                files.push((name, data));
            }
            Some("directoryName") => {
                let text = field.text().await?;
                directory_name = sanitize_entry_path(text.trim(), None)
                    .and_then(|dir| dir.rsplit('/').next().map(str::to_string));
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(UploadError::NoFile);
    }

    let (file_name, payload) = if directory_name.is_some() || files.len() > 1 {
        let archive_name = format!("{}.zip", directory_name.as_deref().unwrap_or("upload"));
        let payload = tokio::task::spawn_blocking(move || pack_upload(files, directory_name))
            .await
            .map_err(|e| PayloadLoadError::Join {
                path: "upload".into(),
                message: e.to_string(),
            })??;
        (archive_name, payload)
    } else {
        let (name, data) = files.remove(0);
        let name = sanitize_entry_path(&name, None)
            .and_then(|path| path.rsplit('/').next().map(str::to_string))
            .unwrap_or_else(|| "upload".to_string());
        (name, data)
    };

    let session = state
        .store
        .create_upload_session(&file_name, payload, state.config.duration)?;

    Ok(Json(UploadResponse {
        slug: session.id,
        file_name: session.file_name,
        expires_at: session.expires_at,
    }))
}

/// Zip upload parts under their paths relative to the shared directory
fn pack_upload(
    files: Vec<(String, Bytes)>,
    directory_name: Option<String>,
) -> Result<Bytes, PayloadLoadError> {
    let mut builder = ZipBuilder::new(directory_name.as_deref().unwrap_or("upload"));
    let mut used = HashSet::new();

    for (index, (name, data)) in files.into_iter().enumerate() {
        let entry = sanitize_entry_path(&name, directory_name.as_deref())
            .unwrap_or_else(|| format!("file-{}", index + 1));
        let entry = unique_entry(&mut used, entry);
        builder.add_file(&entry, &data)?;
    }

    builder.finish()
}

fn unique_entry(used: &mut HashSet<String>, entry: String) -> String {
    if used.insert(entry.clone()) {
        return entry;
    }
    let (stem, ext) = match entry.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
            (stem.to_string(), format!(".{}", ext))
        }
        _ => (entry.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        let value = content_disposition("na\"me.txt");
        assert!(value.starts_with("attachment; filename=\"na_me.txt\""));
        assert!(value.contains("filename*=UTF-8''na%22me.txt"));

        let value = content_disposition("résumé.pdf");
        assert!(value.contains("filename=\"r_sum_.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn test_wants_download() {
        let mut params = HashMap::new();
        assert!(!wants_download(&params));

        params.insert("download".to_string(), "1".to_string());
        assert!(wants_download(&params));

        params.insert("download".to_string(), "TRUE".to_string());
        assert!(wants_download(&params));

        params.insert("download".to_string(), "0".to_string());
        assert!(!wants_download(&params));
    }

    #[test]
    fn test_unique_entry() {
        let mut used = HashSet::new();
        assert_eq!(unique_entry(&mut used, "a.txt".to_string()), "a.txt");
        assert_eq!(unique_entry(&mut used, "a.txt".to_string()), "a (2).txt");
        assert_eq!(unique_entry(&mut used, "a.txt".to_string()), "a (3).txt");
        assert_eq!(unique_entry(&mut used, "README".to_string()), "README");
        assert_eq!(unique_entry(&mut used, "README".to_string()), "README (2)");
    }

    #[test]
    fn test_pack_upload_strips_directory_prefix() {
        use std::io::Read;

        let files = vec![
            ("project/index.js".to_string(), Bytes::from_static(b"one")),
            ("project/src/main.js".to_string(), Bytes::from_static(b"two")),
        ];
        let bytes = pack_upload(files, Some("project".to_string())).unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut contents = String::new();
        archive
            .by_name("src/main.js")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "two");
        assert!(archive.by_name("index.js").is_ok());
    }
}
