//! opendir, closedir, readdir, cacheDir (spec.md §4.5).

use std::sync::Arc;

use crate::config::OpKind;
use crate::context::Context;
use crate::error::CoreResult;
use crate::fsops::attr::stat_from_meta;
use crate::fsops::envelope;
use crate::handle::DirHandle;
use crate::metadata_cache::Stat;

/// spec.md §4.5 `opendir(p)`: a fresh cached entry list serves the
/// directory with no connection at all; otherwise open a live backend
/// iterator.
pub fn opendir(ctx: &Context, path: &str) -> CoreResult<Arc<DirHandle>> {
    if let Some(cached) = ctx.cache.get_dir_entry(path) {
        return Ok(ctx.handles.open_dir_with_cache(path, cached));
    }

    let class = ctx.config.class_for(OpKind::LongLived);
    let conn = ctx.pool.acquire(class)?;
    ctx.handles
        .open_dir(ctx.backend.as_ref(), &ctx.runtime, conn.clone(), path)
        .inspect_err(|_| ctx.pool.release(&conn))
}

/// spec.md §4.5 `closedir(D)`.
pub fn closedir(ctx: &Context, handle: &Arc<DirHandle>) {
    ctx.handles.close_dir(ctx.backend.as_ref(), &ctx.runtime, handle);
    if let Some(conn) = &handle.conn {
        ctx.pool.release(conn);
    }
}

/// spec.md §4.5 `readdir(D, filler)`. A cached handle yields bare names
/// from its NUL-separated buffer; a live handle iterates the backend
/// collection, caching each child's stat and directory-entry membership
/// as it goes.
pub fn readdir(ctx: &Context, handle: &Arc<DirHandle>, mut filler: impl FnMut(&str, Option<Stat>)) -> CoreResult<()> {
    if let Some(cached) = &handle.cached_entries {
        for name in cached.split(|&b| b == 0) {
            if name.is_empty() {
                continue;
            }
            if let Ok(name) = std::str::from_utf8(name) {
                filler(name, None);
            }
        }
        return Ok(());
    }

    let conn = handle
        .conn
        .as_ref()
        .expect("live directory handle must be bound to a connection");
    let iterator = handle
        .iterator
        .lock()
        .unwrap()
        .expect("live directory handle must have an open iterator");

    // Stale cached entries for this path cannot be trusted once we
    // start a live re-read.
    ctx.cache.remove_dir(&handle.path);

    loop {
        let next = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
            backend.read_collection(session, iterator)
        })?;
        let entry = match next {
            Some(entry) => entry,
            None => break,
        };
        let stat = stat_from_meta(&entry.meta);
        ctx.cache.put_stat2(&handle.path, &entry.name, stat.clone());
        ctx.cache.add_dir_entry(&handle.path, &entry.name);
        filler(&entry.name, Some(stat));
    }
    Ok(())
}

/// spec.md §6 `cacheDir(path)`: force a fresh live read of `path` purely
/// to warm the metadata cache, independent of any open `DirHandle`.
pub fn cache_dir(ctx: &Context, path: &str) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::LongLived);
    let conn = ctx.pool.acquire(class)?;
    let handle = match ctx.handles.open_dir(ctx.backend.as_ref(), &ctx.runtime, conn.clone(), path) {
        Ok(h) => h,
        Err(e) => {
            ctx.pool.release(&conn);
            return Err(e);
        }
    };
    let result = readdir(ctx, &handle, |_, _| {});
    ctx.handles.close_dir(ctx.backend.as_ref(), &ctx.runtime, &handle);
    ctx.pool.release(&conn);
    result
}
