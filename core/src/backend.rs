//! The backend RPC client interface (spec.md §6 "Backend client
//! interface"). This crate depends only on this trait; the wire protocol
//! and authentication it represents are out of scope (spec.md §1) and
//! live in a separate, concrete implementation (see the `backend-http`
//! workspace member).

use async_trait::async_trait;
use bytes::Bytes;

/// Metadata about one object or collection, as returned by `obj_stat`
/// and by collection iteration.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Numeric portion of the backend's data-id, parsed into `ino`.
    pub data_id: u64,
    pub is_collection: bool,
    pub size: u64,
    pub mode: i32,
    pub mtime: i64,
}

/// One child of a collection, as returned by `read_collection`.
#[derive(Debug, Clone)]
pub struct CollectionEntry {
    pub name: String,
    pub meta: ObjectMeta,
}

/// An opaque handle to an in-progress collection read, returned by
/// `open_collection` and consumed by `read_collection`/`close_collection`.
pub type CollectionHandle = u64;

/// A status code as returned by the backend wire protocol. Low bits may
/// encode a POSIX errno (`CoreError::BackendErrno`); a dedicated range is
/// reserved for transient wire failures, tested via
/// `Backend::is_read_msg_error`.
pub type Status = i32;

#[derive(Debug, thiserror::Error)]
#[error("backend RPC failed with status {0}")]
pub struct BackendError(pub Status);

pub type BackendResult<T> = Result<T, BackendError>;

/// An authenticated session handle. Opaque to `core`; owned and
/// transported by the concrete backend implementation.
pub type SessionId = u64;

/// The RPC surface `core` consumes from the backend (spec.md §6).
///
/// Every method maps to one backend RPC. `core::pool` calls `connect`/
/// `login`/`set_session_ticket`/`disconnect` to manage session lifetime;
/// `core::fsops` calls the data-object and collection methods inside the
/// RPC envelope (spec.md §6).
#[async_trait]
pub trait Backend: Send + Sync {
    async fn connect(&self) -> BackendResult<SessionId>;
    async fn login(&self, session: SessionId) -> BackendResult<()>;
    async fn set_session_ticket(&self, session: SessionId, ticket: &str) -> BackendResult<()>;
    async fn disconnect(&self, session: SessionId) -> BackendResult<()>;

    async fn obj_stat(&self, session: SessionId, path: &str) -> BackendResult<ObjectMeta>;

    async fn data_obj_open(&self, session: SessionId, path: &str, flags: i32) -> BackendResult<i32>;
    async fn data_obj_close(&self, session: SessionId, bfd: i32) -> BackendResult<()>;
    async fn data_obj_read(
        &self,
        session: SessionId,
        bfd: i32,
        len: usize,
    ) -> BackendResult<Bytes>;
    async fn data_obj_write(
        &self,
        session: SessionId,
        bfd: i32,
        data: &[u8],
    ) -> BackendResult<usize>;
    async fn data_obj_lseek(&self, session: SessionId, bfd: i32, offset: i64) -> BackendResult<i64>;
    async fn data_obj_create(&self, session: SessionId, path: &str, mode: i32) -> BackendResult<i32>;
    async fn data_obj_unlink(&self, session: SessionId, path: &str) -> BackendResult<()>;
    async fn data_obj_truncate(&self, session: SessionId, path: &str, size: u64) -> BackendResult<()>;
    async fn data_obj_rename(&self, session: SessionId, from: &str, to: &str) -> BackendResult<()>;

    async fn coll_create(&self, session: SessionId, path: &str) -> BackendResult<()>;
    async fn rm_coll(&self, session: SessionId, path: &str) -> BackendResult<()>;
    async fn open_collection(&self, session: SessionId, path: &str) -> BackendResult<CollectionHandle>;
    async fn read_collection(
        &self,
        session: SessionId,
        handle: CollectionHandle,
    ) -> BackendResult<Option<CollectionEntry>>;
    async fn close_collection(&self, session: SessionId, handle: CollectionHandle) -> BackendResult<()>;

    async fn mod_data_obj_meta(&self, session: SessionId, path: &str, mode: i32) -> BackendResult<()>;

    /// Identifies an RPC failure as a transient wire error eligible for
    /// the reconnect-and-retry envelope (spec.md §6, §7).
    fn is_read_msg_error(&self, status: Status) -> bool;
}

/// In-memory `Backend` used by `core`'s own unit tests (spec.md §8
/// scenarios S5, S6, S7). Not part of the public API; exercises the
/// pool and FS operation layer without any real network I/O.
#[cfg(test)]
pub mod tests_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    pub const TRANSIENT_STATUS: i32 = -1000;

    #[derive(Default)]
    pub struct CountingBackend {
        pub next_session: AtomicU64,
        pub connect_calls: AtomicU64,
        pub reconnect_calls: AtomicU64,
        pub disconnect_calls: AtomicU64,
        pub obj_stat_calls: AtomicU64,
        /// When true, the *next* `obj_stat` call fails transiently, then
        /// clears itself (S5 "inject a transient wire error on the first
        /// call").
        pub fail_next_obj_stat: AtomicBool,
        /// When true, the *next* `rm_coll` call fails with "not empty",
        /// then clears itself (S4).
        pub fail_next_rm_coll: AtomicBool,
        pub rm_coll_calls: AtomicU64,
        pub objects: Mutex<HashMap<String, ObjectMeta>>,
        pub files: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl Backend for CountingBackend {
        async fn connect(&self) -> BackendResult<SessionId> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.next_session.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn login(&self, _session: SessionId) -> BackendResult<()> {
            Ok(())
        }

        async fn set_session_ticket(&self, _session: SessionId, _ticket: &str) -> BackendResult<()> {
            Ok(())
        }

        async fn disconnect(&self, _session: SessionId) -> BackendResult<()> {
            self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn obj_stat(&self, _session: SessionId, path: &str) -> BackendResult<ObjectMeta> {
            self.obj_stat_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_obj_stat.swap(false, Ordering::SeqCst) {
                return Err(BackendError(TRANSIENT_STATUS));
            }
            self.objects
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or(BackendError(-libc::ENOENT))
        }

        async fn data_obj_open(&self, _session: SessionId, _path: &str, _flags: i32) -> BackendResult<i32> {
            Ok(1)
        }

        async fn data_obj_close(&self, _session: SessionId, _bfd: i32) -> BackendResult<()> {
            Ok(())
        }

        async fn data_obj_read(&self, _session: SessionId, _bfd: i32, _len: usize) -> BackendResult<Bytes> {
            Ok(Bytes::new())
        }

        async fn data_obj_write(&self, _session: SessionId, _bfd: i32, data: &[u8]) -> BackendResult<usize> {
            Ok(data.len())
        }

        async fn data_obj_lseek(&self, _session: SessionId, _bfd: i32, offset: i64) -> BackendResult<i64> {
            Ok(offset)
        }

        async fn data_obj_create(&self, _session: SessionId, _path: &str, _mode: i32) -> BackendResult<i32> {
            Ok(1)
        }

        async fn data_obj_unlink(&self, _session: SessionId, _path: &str) -> BackendResult<()> {
            Ok(())
        }

        async fn data_obj_truncate(&self, _session: SessionId, _path: &str, _size: u64) -> BackendResult<()> {
            Ok(())
        }

        async fn data_obj_rename(&self, _session: SessionId, _from: &str, _to: &str) -> BackendResult<()> {
            Ok(())
        }

        async fn coll_create(&self, _session: SessionId, _path: &str) -> BackendResult<()> {
            Ok(())
        }

        async fn rm_coll(&self, _session: SessionId, _path: &str) -> BackendResult<()> {
            self.rm_coll_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_rm_coll.swap(false, Ordering::SeqCst) {
                return Err(BackendError(-libc::ENOTEMPTY));
            }
            Ok(())
        }

        async fn open_collection(&self, _session: SessionId, _path: &str) -> BackendResult<CollectionHandle> {
            Ok(1)
        }

        async fn read_collection(
            &self,
            _session: SessionId,
            _handle: CollectionHandle,
        ) -> BackendResult<Option<CollectionEntry>> {
            Ok(None)
        }

        async fn close_collection(&self, _session: SessionId, _handle: CollectionHandle) -> BackendResult<()> {
            Ok(())
        }

        async fn mod_data_obj_meta(&self, _session: SessionId, _path: &str, _mode: i32) -> BackendResult<()> {
            Ok(())
        }

        fn is_read_msg_error(&self, status: Status) -> bool {
            status == TRANSIENT_STATUS
        }
    }
}
