//! Immutable runtime configuration (spec.md §3 "Configuration").
//!
//! `Config` is built once by the `client` binary (from CLI flags, env
//! vars, and compiled-in defaults) and shared read-only as `Arc<Config>`
//! for the life of the mount. Nothing in `core` mutates it.

use serde::{Deserialize, Serialize};

/// Default upper bound on concurrent pooled file-I/O connections.
pub const DEFAULT_MAX_CONN: u32 = 10;
/// Default buffered-I/O block size, consumed by the read-ahead layer
/// above this core (external collaborator, spec.md §1).
pub const DEFAULT_BLOCK_SIZE: u32 = 1024 * 1024;
pub const DEFAULT_CONN_TIMEOUT_SEC: u64 = 300;
pub const DEFAULT_CONN_KEEP_ALIVE_SEC: u64 = 600;
pub const DEFAULT_CONN_CHECK_INTERVAL_SEC: u64 = 60;
pub const DEFAULT_RODS_API_TIMEOUT_SEC: u64 = 300;
pub const DEFAULT_METADATA_CACHE_TIMEOUT_SEC: u64 = 180;
pub const DEFAULT_PRELOAD_NUM_BLOCKS: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on concurrent pooled connections of the general
    /// (file-I/O) class.
    pub max_conn: u32,
    /// Buffered-I/O block size. Consumed only by the external
    /// buffered-I/O / read-ahead layer (spec.md §1 Out of scope).
    pub block_size: u32,
    /// If true, short-op and file-I/O paths use pooled connection
    /// classes; if false, those paths fall back to one-time-use
    /// connections. Defaults to `false` (spec.md §9 Open Questions).
    pub conn_reuse: bool,
    pub conn_timeout_sec: u64,
    pub conn_keep_alive_sec: u64,
    pub conn_check_interval_sec: u64,
    /// Per-RPC deadline.
    pub rods_api_timeout_sec: u64,
    /// TTL for stat and directory-entry cache entries.
    pub metadata_cache_timeout_sec: u64,
    /// Read-ahead depth, consumed by the external prefetcher.
    pub preload_num_blocks: u32,
    /// Backend session ticket, if any.
    pub ticket: Option<String>,
    /// Backend working directory / home collection.
    pub workdir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_conn: DEFAULT_MAX_CONN,
            block_size: DEFAULT_BLOCK_SIZE,
            conn_reuse: false,
            conn_timeout_sec: DEFAULT_CONN_TIMEOUT_SEC,
            conn_keep_alive_sec: DEFAULT_CONN_KEEP_ALIVE_SEC,
            conn_check_interval_sec: DEFAULT_CONN_CHECK_INTERVAL_SEC,
            rods_api_timeout_sec: DEFAULT_RODS_API_TIMEOUT_SEC,
            metadata_cache_timeout_sec: DEFAULT_METADATA_CACHE_TIMEOUT_SEC,
            preload_num_blocks: DEFAULT_PRELOAD_NUM_BLOCKS,
            ticket: None,
            workdir: "/".to_string(),
        }
    }
}

/// Which pooled class an operation should acquire from, given whether
/// connection reuse is enabled (spec.md §4.5 "Connection classes by
/// op").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// getattr, create, unlink, mkdir, rmdir, rename, truncate, chmod.
    ShortLived,
    /// open, opendir — the connection outlives the single RPC.
    LongLived,
}

impl Config {
    /// Resolves the connection class an operation of kind `op` should
    /// request, honoring `conn_reuse`.
    pub fn class_for(&self, op: OpKind) -> crate::pool::ConnClass {
        use crate::pool::ConnClass;
        match (op, self.conn_reuse) {
            (OpKind::ShortLived, true) => ConnClass::ShortOp,
            (OpKind::ShortLived, false) => ConnClass::Onetime,
            (OpKind::LongLived, true) => ConnClass::FileIo,
            (OpKind::LongLived, false) => ConnClass::Onetime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ConnClass;

    #[test]
    fn default_conn_reuse_is_false() {
        assert!(!Config::default().conn_reuse);
    }

    #[test]
    fn class_for_respects_conn_reuse() {
        let mut cfg = Config::default();
        cfg.conn_reuse = false;
        assert_eq!(cfg.class_for(OpKind::ShortLived), ConnClass::Onetime);
        assert_eq!(cfg.class_for(OpKind::LongLived), ConnClass::Onetime);

        cfg.conn_reuse = true;
        assert_eq!(cfg.class_for(OpKind::ShortLived), ConnClass::ShortOp);
        assert_eq!(cfg.class_for(OpKind::LongLived), ConnClass::FileIo);
    }
}
