//! Axum route handlers (spec.md §6 "Backend client interface", server
//! side). Grounded on the teacher's `server/src/handlers.rs` (a flat
//! set of `fs::`-backed handlers keyed by an axum `Path` extractor,
//! storing objects as files under a local `data/` directory),
//! generalized to cover the full `Backend` RPC surface instead of just
//! read/write/list/mkdir/delete.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use bytes::Bytes;

use crate::wire::{ChmodQuery, EntryDto, ObjectMetaDto, ReadQuery, RenameRequest, TruncateQuery, WriteQuery, WrittenResponse};

#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
}

/// Resolves a request path into a path under `root`, rejecting any
/// attempt to escape it via `..` components.
fn resolve(root: &FsPath, rel: &str) -> Result<PathBuf, StatusCode> {
    let rel = rel.trim_start_matches('/');
    if rel.split('/').any(|seg| seg == "..") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(root.join(rel))
}

fn meta_dto(meta: &fs::Metadata) -> ObjectMetaDto {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    ObjectMetaDto {
        data_id: meta.ino(),
        is_collection: meta.is_dir(),
        size: meta.len(),
        mode: (meta.permissions().mode() & 0o7777) as i32,
        mtime,
    }
}

fn io_status(e: &std::io::Error) -> StatusCode {
    match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ if e.raw_os_error() == Some(libc::ENOTEMPTY) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn stat(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code.into_response(),
    };
    match fs::metadata(&full) {
        Ok(meta) => Json(meta_dto(&meta)).into_response(),
        Err(e) => io_status(&e).into_response(),
    }
}

pub async fn stat_root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stat(State(state), Path(String::new())).await
}

pub async fn list(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code.into_response(),
    };
    let read_dir = match fs::read_dir(&full) {
        Ok(rd) => rd,
        Err(e) => return io_status(&e).into_response(),
    };
    let mut entries = Vec::new();
    for entry in read_dir.flatten() {
        if let Ok(meta) = entry.metadata() {
            entries.push(EntryDto {
                name: entry.file_name().to_string_lossy().to_string(),
                meta: meta_dto(&meta),
            });
        }
    }
    Json(entries).into_response()
}

pub async fn list_root(state: State<Arc<AppState>>) -> impl IntoResponse {
    list(state, Path(String::new())).await
}

pub async fn read(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(q): Query<ReadQuery>,
) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code.into_response(),
    };
    let data = match fs::read(&full) {
        Ok(d) => d,
        Err(e) => return io_status(&e).into_response(),
    };
    let start = (q.offset as usize).min(data.len());
    let end = start.saturating_add(q.len).min(data.len());
    Bytes::copy_from_slice(&data[start..end]).into_response()
}

/// `PUT /files/*path`: create or fully overwrite a file with `body`
/// (spec.md's `dataObjCreate` plus an implicit whole-file write, the
/// simplest mapping onto a stateless HTTP verb).
pub async fn put_file(State(state): State<Arc<AppState>>, Path(path): Path<String>, body: Bytes) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match fs::write(&full, &body) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub async fn write(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(q): Query<WriteQuery>,
    body: Bytes,
) -> impl IntoResponse {
    use std::io::{Seek, SeekFrom, Write as IoWrite};

    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code.into_response(),
    };
    let mut file = match fs::OpenOptions::new().write(true).create(true).open(&full) {
        Ok(f) => f,
        Err(e) => return io_status(&e).into_response(),
    };
    if file.seek(SeekFrom::Start(q.offset)).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match file.write_all(&body) {
        Ok(()) => Json(WrittenResponse { written: body.len() }).into_response(),
        Err(e) => io_status(&e).into_response(),
    }
}

pub async fn unlink(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match fs::remove_file(&full) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub async fn mkdir(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match fs::create_dir_all(&full) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub async fn rmdir(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match fs::remove_dir(&full) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub async fn rename(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Json(req): Json<RenameRequest>,
) -> impl IntoResponse {
    let from = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let to = match resolve(&state.root, &req.to) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match fs::rename(&from, &to) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub async fn truncate(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(q): Query<TruncateQuery>,
) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let file = match fs::OpenOptions::new().write(true).open(&full) {
        Ok(f) => f,
        Err(e) => return io_status(&e),
    };
    match file.set_len(q.size) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub async fn chmod(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(q): Query<ChmodQuery>,
) -> impl IntoResponse {
    let full = match resolve(&state.root, &path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let perms = std::fs::Permissions::from_mode((q.mode & 0o7777) as u32);
    match fs::set_permissions(&full, perms) {
        Ok(()) => StatusCode::OK,
        Err(e) => io_status(&e),
    }
}

pub fn app(root: PathBuf) -> Router {
    let state = Arc::new(AppState { root });
    Router::new()
        .route("/health", get(health))
        .route("/stat", get(stat_root))
        .route("/stat/*path", get(stat))
        .route("/list", get(list_root))
        .route("/list/*path", get(list))
        .route("/files/*path", get(read).put(put_file).patch(write).delete(unlink))
        .route("/mkdir/*path", post(mkdir))
        .route("/dirs/*path", delete(rmdir))
        .route("/rename/*path", post(rename))
        .route("/truncate/*path", post(truncate))
        .route("/chmod/*path", post(chmod))
        .with_state(state)
}
