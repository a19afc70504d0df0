//! getattr, chmod, truncate (spec.md §4.5).
//!
//! Stat field-filling rules are ported from `_fillFileStat`/`_fillDirStat`
//! in `iFuse.FS.cpp`: regular files get `DEF_FILE_MODE` unless the
//! backend reports a mode ≥ 0100, directories are always `DEF_DIR_MODE`
//! and a fixed synthetic size.

use crate::config::OpKind;
use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::fsops::envelope;
use crate::metadata_cache::Stat;

pub const DEF_FILE_MODE: i32 = 0o644;
pub const DEF_DIR_MODE: i32 = 0o755;
pub const FILE_BLOCK_SIZE: u64 = 4096;
pub const DIR_SIZE: u64 = 4096;

pub(crate) fn stat_from_meta(meta: &crate::backend::ObjectMeta) -> Stat {
    if meta.is_collection {
        Stat {
            ino: meta.data_id,
            is_dir: true,
            size: DIR_SIZE,
            mode: DEF_DIR_MODE,
            mtime: meta.mtime,
        }
    } else {
        let mode = if meta.mode >= 0o100 { meta.mode } else { DEF_FILE_MODE };
        Stat {
            ino: meta.data_id,
            is_dir: false,
            size: meta.size,
            mode,
            mtime: meta.mtime,
        }
    }
}

/// spec.md §4.5 `getattr(p)`: cache-first, with a negative-cache
/// short-circuit through the parent directory's entry list before ever
/// touching the backend.
pub fn getattr(ctx: &Context, path: &str) -> CoreResult<Stat> {
    ctx.cache.clear_expired_stat(false);
    if let Some(stat) = ctx.cache.get_stat(path) {
        return Ok(stat);
    }

    ctx.cache.clear_expired_dir(false);
    if path != "/" {
        let (dir, _) = crate::time::split_path(path);
        // Only a short-circuit if the parent's entry list is itself
        // cached and fresh; an absent parent entry says nothing.
        if ctx.cache.get_dir_entry(&dir).is_some() && !ctx.cache.check_existence_of_dir_entry(path) {
            return Err(CoreError::NotFound);
        }
    }

    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let path_owned = path.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.obj_stat(session, &path_owned)
    });
    ctx.pool.release(&conn);

    let meta = result?;
    let stat = stat_from_meta(&meta);
    ctx.cache.put_stat(path, stat.clone());
    Ok(stat)
}

/// spec.md §4.5 `truncate(p, size)`.
pub fn truncate(ctx: &Context, path: &str, size: u64) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let path_owned = path.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.data_obj_truncate(session, &path_owned, size)
    });
    ctx.pool.release(&conn);
    result?;
    ctx.cache.remove_stat(path);
    Ok(())
}

/// spec.md §4.5 `chmod(p, mode)`.
pub fn chmod(ctx: &Context, path: &str, mode: i32) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let path_owned = path.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.mod_data_obj_meta(session, &path_owned, mode)
    });
    ctx.pool.release(&conn);
    result?;
    ctx.cache.remove_stat(path);
    Ok(())
}
