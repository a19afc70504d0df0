//! `HttpBackend`: the HTTP implementation of `remotefs_core::backend::Backend`
//! (spec.md §6 "Backend client interface").
//!
//! Grounded on the teacher's `client/src/api_client.rs` (a thin
//! `reqwest`-based client with one async function per server endpoint,
//! called via `runtime.block_on` from the synchronous FUSE layer),
//! generalized from "whole-file GET/PUT" into the open/seek/read/write
//! session model `core::pool`/`core::handle` expect. Since HTTP itself
//! is stateless, the session and per-fd cursor are tracked client-side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};

use remotefs_core::backend::{
    Backend, BackendError, BackendResult, CollectionEntry, CollectionHandle, ObjectMeta, SessionId, Status,
};

use crate::wire::{EntryDto, ObjectMetaDto, RenameRequest};

/// Reserved status identifying a network-level failure (connection
/// refused, timeout, DNS) as opposed to an HTTP-level error response —
/// the only status `is_read_msg_error` accepts as transient.
pub const TRANSIENT_STATUS: i32 = -1;

const TICKET_HEADER: &str = "X-Object-Store-Ticket";

struct OpenFile {
    path: String,
    offset: AtomicU64,
}

struct OpenCollection {
    entries: Vec<CollectionEntry>,
    next: usize,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    sessions: RwLock<HashMap<SessionId, Option<String>>>,
    next_session: AtomicU64,
    files: RwLock<HashMap<i32, OpenFile>>,
    next_bfd: AtomicI32,
    collections: Mutex<HashMap<CollectionHandle, OpenCollection>>,
    next_collection: AtomicU64,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpBackend {
            client: Client::new(),
            base_url: base_url.into(),
            sessions: RwLock::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            files: RwLock::new(HashMap::new()),
            next_bfd: AtomicI32::new(1),
            collections: Mutex::new(HashMap::new()),
            next_collection: AtomicU64::new(1),
        }
    }

    fn url(&self, segment: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}/{}", self.base_url, segment, path)
    }

    fn status_for(status: StatusCode) -> i32 {
        match status {
            StatusCode::NOT_FOUND => -libc::ENOENT,
            StatusCode::CONFLICT => -libc::ENOTEMPTY,
            StatusCode::BAD_REQUEST => -libc::EINVAL,
            _ => -libc::EIO,
        }
    }

    fn ticket_header(&self, session: SessionId) -> Option<String> {
        self.sessions.read().unwrap().get(&session).cloned().flatten()
    }

    /// Attaches the session's ticket, if any, as a request header
    /// (spec.md §6 `setSessionTicket`).
    fn authed(&self, session: SessionId, rb: RequestBuilder) -> RequestBuilder {
        match self.ticket_header(session) {
            Some(ticket) => rb.header(TICKET_HEADER, ticket),
            None => rb,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn connect(&self) -> BackendResult<SessionId> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if !resp.status().is_success() {
            return Err(BackendError(TRANSIENT_STATUS));
        }
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        self.sessions.write().unwrap().insert(id, None);
        Ok(id)
    }

    async fn login(&self, _session: SessionId) -> BackendResult<()> {
        Ok(())
    }

    async fn set_session_ticket(&self, session: SessionId, ticket: &str) -> BackendResult<()> {
        self.sessions.write().unwrap().insert(session, Some(ticket.to_string()));
        Ok(())
    }

    async fn disconnect(&self, session: SessionId) -> BackendResult<()> {
        self.sessions.write().unwrap().remove(&session);
        Ok(())
    }

    async fn obj_stat(&self, session: SessionId, path: &str) -> BackendResult<ObjectMeta> {
        let resp = self
            .authed(session, self.client.get(self.url("stat", path)))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if !resp.status().is_success() {
            return Err(BackendError(Self::status_for(resp.status())));
        }
        let dto: ObjectMetaDto = resp.json().await.map_err(|_| BackendError(-libc::EIO))?;
        Ok(ObjectMeta {
            data_id: dto.data_id,
            is_collection: dto.is_collection,
            size: dto.size,
            mode: dto.mode,
            mtime: dto.mtime,
        })
    }

    async fn data_obj_open(&self, _session: SessionId, path: &str, _flags: i32) -> BackendResult<i32> {
        let bfd = self.next_bfd.fetch_add(1, Ordering::SeqCst);
        self.files.write().unwrap().insert(
            bfd,
            OpenFile {
                path: path.to_string(),
                offset: AtomicU64::new(0),
            },
        );
        Ok(bfd)
    }

    async fn data_obj_close(&self, _session: SessionId, bfd: i32) -> BackendResult<()> {
        self.files.write().unwrap().remove(&bfd);
        Ok(())
    }

    async fn data_obj_read(&self, session: SessionId, bfd: i32, len: usize) -> BackendResult<Bytes> {
        let (path, offset) = {
            let files = self.files.read().unwrap();
            let f = files.get(&bfd).ok_or(BackendError(-libc::EBADF))?;
            (f.path.clone(), f.offset.load(Ordering::SeqCst))
        };
        let resp = self
            .authed(
                session,
                self.client
                    .get(self.url("files", &path))
                    .query(&[("offset", offset.to_string()), ("len", len.to_string())]),
            )
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if !resp.status().is_success() {
            return Err(BackendError(Self::status_for(resp.status())));
        }
        let data = resp.bytes().await.map_err(|_| BackendError(-libc::EIO))?;
        if let Some(f) = self.files.read().unwrap().get(&bfd) {
            f.offset.fetch_add(data.len() as u64, Ordering::SeqCst);
        }
        Ok(data)
    }

    async fn data_obj_write(&self, session: SessionId, bfd: i32, data: &[u8]) -> BackendResult<usize> {
        let (path, offset) = {
            let files = self.files.read().unwrap();
            let f = files.get(&bfd).ok_or(BackendError(-libc::EBADF))?;
            (f.path.clone(), f.offset.load(Ordering::SeqCst))
        };
        let resp = self
            .authed(
                session,
                self.client
                    .patch(self.url("files", &path))
                    .query(&[("offset", offset.to_string())])
                    .body(data.to_vec()),
            )
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if !resp.status().is_success() {
            return Err(BackendError(Self::status_for(resp.status())));
        }
        if let Some(f) = self.files.read().unwrap().get(&bfd) {
            f.offset.fetch_add(data.len() as u64, Ordering::SeqCst);
        }
        Ok(data.len())
    }

    async fn data_obj_lseek(&self, _session: SessionId, bfd: i32, offset: i64) -> BackendResult<i64> {
        let files = self.files.read().unwrap();
        let f = files.get(&bfd).ok_or(BackendError(-libc::EBADF))?;
        f.offset.store(offset.max(0) as u64, Ordering::SeqCst);
        Ok(offset)
    }

    async fn data_obj_create(&self, session: SessionId, path: &str, _mode: i32) -> BackendResult<i32> {
        let resp = self
            .authed(session, self.client.put(self.url("files", path)).body(Vec::new()))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if !resp.status().is_success() {
            return Err(BackendError(Self::status_for(resp.status())));
        }
        let bfd = self.next_bfd.fetch_add(1, Ordering::SeqCst);
        self.files.write().unwrap().insert(
            bfd,
            OpenFile {
                path: path.to_string(),
                offset: AtomicU64::new(0),
            },
        );
        Ok(bfd)
    }

    async fn data_obj_unlink(&self, session: SessionId, path: &str) -> BackendResult<()> {
        let resp = self
            .authed(session, self.client.delete(self.url("files", path)))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BackendError(Self::status_for(resp.status())))
        }
    }

    async fn data_obj_truncate(&self, session: SessionId, path: &str, size: u64) -> BackendResult<()> {
        let resp = self
            .authed(
                session,
                self.client.post(self.url("truncate", path)).query(&[("size", size.to_string())]),
            )
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BackendError(Self::status_for(resp.status())))
        }
    }

    async fn data_obj_rename(&self, session: SessionId, from: &str, to: &str) -> BackendResult<()> {
        let resp = self
            .authed(
                session,
                self.client.post(self.url("rename", from)).json(&RenameRequest { to: to.to_string() }),
            )
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BackendError(Self::status_for(resp.status())))
        }
    }

    async fn coll_create(&self, session: SessionId, path: &str) -> BackendResult<()> {
        let resp = self
            .authed(session, self.client.post(self.url("mkdir", path)))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BackendError(Self::status_for(resp.status())))
        }
    }

    async fn rm_coll(&self, session: SessionId, path: &str) -> BackendResult<()> {
        let resp = self
            .authed(session, self.client.delete(self.url("dirs", path)))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BackendError(Self::status_for(resp.status())))
        }
    }

    async fn open_collection(&self, session: SessionId, path: &str) -> BackendResult<CollectionHandle> {
        let resp = self
            .authed(session, self.client.get(self.url("list", path)))
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if !resp.status().is_success() {
            return Err(BackendError(Self::status_for(resp.status())));
        }
        let dtos: Vec<EntryDto> = resp.json().await.map_err(|_| BackendError(-libc::EIO))?;
        let entries = dtos
            .into_iter()
            .map(|d| CollectionEntry {
                name: d.name,
                meta: ObjectMeta {
                    data_id: d.meta.data_id,
                    is_collection: d.meta.is_collection,
                    size: d.meta.size,
                    mode: d.meta.mode,
                    mtime: d.meta.mtime,
                },
            })
            .collect();
        let handle = self.next_collection.fetch_add(1, Ordering::SeqCst);
        self.collections.lock().unwrap().insert(handle, OpenCollection { entries, next: 0 });
        Ok(handle)
    }

    async fn read_collection(&self, _session: SessionId, handle: CollectionHandle) -> BackendResult<Option<CollectionEntry>> {
        let mut collections = self.collections.lock().unwrap();
        let coll = collections.get_mut(&handle).ok_or(BackendError(-libc::EBADF))?;
        if coll.next >= coll.entries.len() {
            return Ok(None);
        }
        let entry = coll.entries[coll.next].clone();
        coll.next += 1;
        Ok(Some(entry))
    }

    async fn close_collection(&self, _session: SessionId, handle: CollectionHandle) -> BackendResult<()> {
        self.collections.lock().unwrap().remove(&handle);
        Ok(())
    }

    async fn mod_data_obj_meta(&self, session: SessionId, path: &str, mode: i32) -> BackendResult<()> {
        let resp = self
            .authed(
                session,
                self.client.post(self.url("chmod", path)).query(&[("mode", mode.to_string())]),
            )
            .send()
            .await
            .map_err(|_| BackendError(TRANSIENT_STATUS))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BackendError(Self::status_for(resp.status())))
        }
    }

    fn is_read_msg_error(&self, status: Status) -> bool {
        status == TRANSIENT_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_segment_and_path() {
        let backend = HttpBackend::new("http://localhost:9000");
        assert_eq!(backend.url("stat", "/a/b"), "http://localhost:9000/stat/a/b");
    }

    #[test]
    fn ticket_header_absent_for_unknown_session() {
        let backend = HttpBackend::new("http://localhost:9000");
        assert_eq!(backend.ticket_header(42), None);
    }
}
