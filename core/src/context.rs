//! Process-wide state, bundled (spec.md §9 "Global state": "a target
//! language without free-function globals should wrap them in an
//! explicit context object passed to each upcall").
//!
//! Grounded on the teacher's `Filesystem` struct in `client/src/fs/mod.rs`
//! (which bundles a `reqwest::Client`, a `tokio::Runtime` handle, and
//! config into one value threaded through every callback); generalized
//! to the five collaborators spec.md §9 names.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::backend::Backend;
use crate::config::Config;
use crate::handle::HandleRegistry;
use crate::metadata_cache::MetadataCache;
use crate::pool::ConnectionPool;
use crate::timer::TimerService;

/// Everything an FS-operation-layer function needs, grouped so the
/// external kernel-upcall glue can own exactly one value instead of
/// juggling five.
pub struct Context {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub runtime: Handle,
    pub pool: Arc<ConnectionPool>,
    pub handles: Arc<HandleRegistry>,
    pub cache: Arc<MetadataCache>,
    pub timer: Arc<TimerService>,
}

impl Context {
    /// Builds the collaborator graph and starts the background tick
    /// (spec.md §9 `init()`): the pool's keep-alive/idle-reap tick is
    /// registered with the timer service before the timer thread starts.
    pub fn init(config: Config, backend: Arc<dyn Backend>, runtime: Handle) -> Arc<Self> {
        let config = Arc::new(config);
        let cache_ttl = config.metadata_cache_timeout_sec;
        let pool = Arc::new(ConnectionPool::new(
            backend.clone(),
            runtime.clone(),
            config.max_conn,
            config.conn_timeout_sec,
            config.conn_keep_alive_sec,
            config.conn_check_interval_sec,
            config.ticket.clone(),
        ));
        let timer = Arc::new(TimerService::new());
        let ctx = Arc::new(Context {
            config,
            backend,
            runtime,
            pool: pool.clone(),
            handles: Arc::new(HandleRegistry::new()),
            cache: Arc::new(MetadataCache::new(cache_ttl)),
            timer: timer.clone(),
        });

        let pool_for_tick = pool.clone();
        timer.register(move || pool_for_tick.tick());
        timer.start();
        ctx
    }

    /// Tears down in reverse order of `init()` (spec.md §9): stop the
    /// timer first so no tick can touch a connection mid-teardown, then
    /// disconnect every pooled connection.
    pub fn destroy(&self) {
        self.timer.stop();
        self.pool.destroy();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.destroy();
    }
}
