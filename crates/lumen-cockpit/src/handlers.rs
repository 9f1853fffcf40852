//! Route handlers of the request front-end.

use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lumen_kernel::normalizer::parse_int_prefix;
use lumen_kernel::{Bridge, DEFAULT_STEP_DELAY, run_integration};
use lumen_types::StatusSnapshot;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::ApiError;

pub const NO_FILES: &str = "No files were uploaded.";

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
    pub uploads_dir: PathBuf,
}

/// `GET /api/:command` – run one command and answer with the snapshot.
pub async fn api_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let snapshot = state.bridge.handle_request(&command, &params).await?;
    Ok(Json(snapshot))
}

/// `POST /api/upload` – store the multipart field `file` under the uploads
/// directory and answer with the stored path as plain text.
///
/// Never touches the device; a later `setImg` has to reference the path.
pub async fn upload(State(state): State<AppState>, multipart: Result<Multipart, MultipartRejection>) -> Response {
    let Ok(mut multipart) = multipart else {
        return (StatusCode::BAD_REQUEST, NO_FILES).into_response();
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return (StatusCode::BAD_REQUEST, NO_FILES).into_response(),
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                return (e.status(), e.body_text()).into_response();
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let Some(name) = field.file_name().and_then(safe_file_name) else {
            return (StatusCode::BAD_REQUEST, "Uploaded file has no usable name.").into_response();
        };
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "upload body could not be read");
                return (e.status(), e.body_text()).into_response();
            }
        };

        return match store(&state.uploads_dir, &name, &bytes).await {
            Ok(path) => {
                info!(path = %path.display(), len = bytes.len(), "upload stored");
                (StatusCode::OK, path.to_string_lossy().into_owned()).into_response()
            }
            Err(e) => {
                error!(error = %e, name = %name, "upload could not be stored");
                (StatusCode::INTERNAL_SERVER_ERROR, "Upload could not be stored.").into_response()
            }
        };
    }
}

/// Last path component of a client-supplied file name, or `None` when
/// nothing usable is left.
fn safe_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

async fn store(dir: &FsPath, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[derive(Debug, Deserialize)]
pub struct TestParams {
    pub delay: Option<String>,
}

/// `GET /test?delay=<ms>` – scripted integration run, then the snapshot.
pub async fn run_test(State(state): State<AppState>, Query(params): Query<TestParams>) -> Json<StatusSnapshot> {
    let delay = params
        .delay
        .as_deref()
        .and_then(parse_int_prefix)
        .map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or(0)))
        .unwrap_or(DEFAULT_STEP_DELAY);

    state.bridge.gate().gate().await;
    let report = run_integration(&state.bridge, delay).await;
    if !report.passed() {
        warn!(failures = report.failures.len(), steps = report.steps, "integration run had failures");
    }
    Json(state.bridge.status())
}
