//! create, mkdir (spec.md §4.5).

use crate::config::OpKind;
use crate::context::Context;
use crate::error::CoreResult;
use crate::fsops::envelope;

/// spec.md §4.5 `create(p, mode)`: create then immediately close on the
/// backend — the FUSE `create` upcall is followed by a separate `open`.
pub fn create(ctx: &Context, path: &str, mode: i32) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;

    let path_owned = path.to_string();
    let bfd = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.data_obj_create(session, &path_owned, mode)
    });
    if let Ok(bfd) = bfd {
        let _ = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
            backend.data_obj_close(session, bfd)
        });
    }
    ctx.pool.release(&conn);
    bfd?;

    ctx.cache.add_dir_entry_if_fresh2(path);
    ctx.cache.remove_stat(path);
    Ok(())
}

/// spec.md §4.5 `mkdir(p)`.
pub fn mkdir(ctx: &Context, path: &str) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let path_owned = path.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.coll_create(session, &path_owned)
    });
    ctx.pool.release(&conn);
    result?;

    ctx.cache.remove_stat(path);
    ctx.cache.remove_dir(path);
    ctx.cache.add_dir_entry_if_fresh2(path);
    Ok(())
}
