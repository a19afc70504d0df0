//! HandleRegistry (spec.md §4.4): file and directory handles, each
//! bound to a pooled connection for its lifetime.
//!
//! Grounded on the teacher's `OpenWriteFile` map in `client/src/fs/mod.rs`
//! (a `HashMap<u64, OpenWriteFile>` keyed by a monotonic `fh`), extended
//! to the file/dir split and connection back-reference spec.md §4.4
//! calls for. Handles hold a non-owning `Arc<Connection>` (spec.md §9
//! "Cyclic ownership": the pool owns connections, handles only borrow
//! them and must release through `ConnectionPool::release` at close).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::backend::Backend;
use crate::error::{CoreError, CoreResult};
use crate::pool::{Connection, ConnectionPool};

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_DIR_ID: AtomicU64 = AtomicU64::new(1);

fn next_file_id() -> u64 {
    NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed)
}

fn next_dir_id() -> u64 {
    NEXT_DIR_ID.fetch_add(1, Ordering::Relaxed)
}

/// An open file handle (spec.md §3 "FileHandle (`F`)").
pub struct FileHandle {
    pub id: u64,
    pub conn: Arc<Connection>,
    pub bfd: std::sync::Mutex<i32>,
    pub path: String,
    pub open_flags: i32,
    /// Offset of the last successful sequential position, or -1 if
    /// unknown.
    pub last_file_pointer: std::sync::Mutex<i64>,
    /// Per-handle writer lock (spec.md §4.4 `lock(F)`/`unlock(F)`): held
    /// across a read/write's seek-then-data RPC pair so two concurrent
    /// reads on the same handle serialize end-to-end, not just per RPC.
    pub io_lock: std::sync::Mutex<()>,
}

/// An open directory handle (spec.md §3 "DirHandle (`D`)"). Exactly one
/// of `{iterator, cached_entries}` is populated at a time.
pub struct DirHandle {
    pub id: u64,
    pub conn: Option<Arc<Connection>>,
    pub iterator: std::sync::Mutex<Option<u64>>,
    pub path: String,
    pub cached_entries: Option<Vec<u8>>,
}

pub struct HandleRegistry {
    files: RwLock<HashMap<u64, Arc<FileHandle>>>,
    dirs: RwLock<HashMap<u64, Arc<DirHandle>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        HandleRegistry {
            files: RwLock::new(HashMap::new()),
            dirs: RwLock::new(HashMap::new()),
        }
    }

    /// RPC-opens `path` on the backend through `conn` (spec.md §4.4
    /// `openFile`). On a transient error, reconnects `conn` once and
    /// retries.
    pub fn open_file(
        &self,
        pool: &ConnectionPool,
        backend: &dyn Backend,
        runtime: &tokio::runtime::Handle,
        conn: Arc<Connection>,
        path: &str,
        flags: i32,
    ) -> CoreResult<Arc<FileHandle>> {
        let _guard = conn.lock();
        let session = conn.session().ok_or(CoreError::AcquireFailure)?;
        let bfd = match runtime.block_on(backend.data_obj_open(session, path, flags)) {
            Ok(bfd) => bfd,
            Err(e) if backend.is_read_msg_error(e.0) => {
                drop(_guard);
                pool.reconnect(&conn)?;
                let _guard = conn.lock();
                let session = conn.session().ok_or(CoreError::AcquireFailure)?;
                runtime
                    .block_on(backend.data_obj_open(session, path, flags))
                    .map_err(|e| CoreError::BackendErrno(e.0))?
            }
            Err(e) => return Err(CoreError::BackendErrno(e.0)),
        };
        conn.update_last_act_time(true);

        let handle = Arc::new(FileHandle {
            id: next_file_id(),
            conn,
            bfd: std::sync::Mutex::new(bfd),
            path: path.to_string(),
            open_flags: flags,
            last_file_pointer: std::sync::Mutex::new(-1),
            io_lock: std::sync::Mutex::new(()),
        });
        self.files.write().unwrap().insert(handle.id, handle.clone());
        Ok(handle)
    }

    /// Closes and reopens the backend fd in place (spec.md §4.4
    /// `reopenFile`): preserves `F.id` and its connection binding,
    /// clears `lastFilePointer`.
    pub fn reopen_file(
        &self,
        pool: &ConnectionPool,
        backend: &dyn Backend,
        runtime: &tokio::runtime::Handle,
        handle: &Arc<FileHandle>,
    ) -> CoreResult<()> {
        let conn = handle.conn.clone();
        let _guard = conn.lock();
        let session = conn.session().ok_or(CoreError::AcquireFailure)?;
        {
            let bfd = *handle.bfd.lock().unwrap();
            let _ = runtime.block_on(backend.data_obj_close(session, bfd));
        }

        let new_bfd = match runtime.block_on(backend.data_obj_open(session, &handle.path, handle.open_flags)) {
            Ok(bfd) => bfd,
            Err(e) if backend.is_read_msg_error(e.0) => {
                drop(_guard);
                pool.reconnect(&conn)?;
                let _guard = conn.lock();
                let session = conn.session().ok_or(CoreError::AcquireFailure)?;
                runtime
                    .block_on(backend.data_obj_open(session, &handle.path, handle.open_flags))
                    .map_err(|e| CoreError::BackendErrno(e.0))?
            }
            Err(e) => return Err(CoreError::BackendErrno(e.0)),
        };
        *handle.bfd.lock().unwrap() = new_bfd;
        *handle.last_file_pointer.lock().unwrap() = -1;
        Ok(())
    }

    /// Opens a live backend collection iterator (spec.md §4.4
    /// `openDir`).
    pub fn open_dir(
        &self,
        backend: &dyn Backend,
        runtime: &tokio::runtime::Handle,
        conn: Arc<Connection>,
        path: &str,
    ) -> CoreResult<Arc<DirHandle>> {
        let _guard = conn.lock();
        let session = conn.session().ok_or(CoreError::AcquireFailure)?;
        let iterator = runtime
            .block_on(backend.open_collection(session, path))
            .map_err(|e| CoreError::BackendErrno(e.0))?;
        let handle = Arc::new(DirHandle {
            id: next_dir_id(),
            conn: Some(conn),
            iterator: std::sync::Mutex::new(Some(iterator)),
            path: path.to_string(),
            cached_entries: None,
        });
        self.dirs.write().unwrap().insert(handle.id, handle.clone());
        Ok(handle)
    }

    /// Opens a directory handle served entirely from the metadata
    /// cache (spec.md §4.4 `openDirWithCache`): no connection, no
    /// iterator.
    pub fn open_dir_with_cache(&self, path: &str, cached_entries: Vec<u8>) -> Arc<DirHandle> {
        let handle = Arc::new(DirHandle {
            id: next_dir_id(),
            conn: None,
            iterator: std::sync::Mutex::new(None),
            path: path.to_string(),
            cached_entries: Some(cached_entries),
        });
        self.dirs.write().unwrap().insert(handle.id, handle.clone());
        handle
    }

    /// Removes `handle` from the registry and closes the backend fd
    /// (best-effort retry on transient close error). Does not release
    /// the associated connection — the FS operation layer does that
    /// after close, since the open side acquired it.
    pub fn close_file(&self, backend: &dyn Backend, runtime: &tokio::runtime::Handle, handle: &Arc<FileHandle>) {
        self.files.write().unwrap().remove(&handle.id);
        let _guard = handle.conn.lock();
        if let Some(session) = handle.conn.session() {
            let bfd = *handle.bfd.lock().unwrap();
            if runtime.block_on(backend.data_obj_close(session, bfd)).is_err() {
                let _ = runtime.block_on(backend.data_obj_close(session, bfd));
            }
        }
    }

    pub fn close_dir(&self, backend: &dyn Backend, runtime: &tokio::runtime::Handle, handle: &Arc<DirHandle>) {
        self.dirs.write().unwrap().remove(&handle.id);
        if let Some(conn) = &handle.conn {
            let _guard = conn.lock();
            if let (Some(session), Some(iter)) = (conn.session(), *handle.iterator.lock().unwrap()) {
                let _ = runtime.block_on(backend.close_collection(session, iter));
            }
        }
    }

    pub fn get_file(&self, id: u64) -> Option<Arc<FileHandle>> {
        self.files.read().unwrap().get(&id).cloned()
    }

    pub fn get_dir(&self, id: u64) -> Option<Arc<DirHandle>> {
        self.dirs.read().unwrap().get(&id).cloned()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests_support::CountingBackend;

    fn setup() -> (ConnectionPool, HandleRegistry, tokio::runtime::Runtime, Arc<CountingBackend>) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let backend = Arc::new(CountingBackend::default());
        let pool = ConnectionPool::new(
            backend.clone() as Arc<dyn Backend>,
            rt.handle().clone(),
            2,
            300,
            600,
            60,
            None,
        );
        (pool, HandleRegistry::new(), rt, backend)
    }

    #[test]
    fn open_file_registers_and_close_removes() {
        let (pool, registry, rt, backend) = setup();
        let conn = pool.acquire(crate::pool::ConnClass::FileIo).unwrap();
        let handle = registry
            .open_file(&pool, backend.as_ref(), rt.handle(), conn.clone(), "/x", 0)
            .unwrap();
        assert!(registry.get_file(handle.id).is_some());
        registry.close_file(backend.as_ref(), rt.handle(), &handle);
        assert!(registry.get_file(handle.id).is_none());
        pool.release(&conn);
    }

    #[test]
    fn reopen_preserves_identity_and_resets_pointer() {
        let (pool, registry, rt, backend) = setup();
        let conn = pool.acquire(crate::pool::ConnClass::FileIo).unwrap();
        let handle = registry
            .open_file(&pool, backend.as_ref(), rt.handle(), conn.clone(), "/x", 0)
            .unwrap();
        *handle.last_file_pointer.lock().unwrap() = 42;
        let id_before = handle.id;
        registry.reopen_file(&pool, backend.as_ref(), rt.handle(), &handle).unwrap();
        assert_eq!(handle.id, id_before);
        assert_eq!(*handle.last_file_pointer.lock().unwrap(), -1);
        pool.release(&conn);
    }

    #[test]
    fn open_dir_with_cache_has_no_connection() {
        let (_pool, registry, _rt, _backend) = setup();
        let handle = registry.open_dir_with_cache("/d", vec![0]);
        assert!(handle.conn.is_none());
        assert!(handle.cached_entries.is_some());
    }
}
