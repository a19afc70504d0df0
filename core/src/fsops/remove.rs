//! unlink, rmdir (spec.md §4.5).

use crate::config::OpKind;
use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::fsops::envelope;

/// spec.md §4.5 `unlink(p)`.
pub fn unlink(ctx: &Context, path: &str) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let path_owned = path.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.data_obj_unlink(session, &path_owned)
    });
    ctx.pool.release(&conn);
    result?;

    ctx.cache.remove_stat(path);
    ctx.cache.remove_dir_entry2(path);
    Ok(())
}

/// spec.md §4.5 `rmdir(p)`: a "not empty" backend response maps to
/// `-ENOTEMPTY` and, per S4, must leave every cache entry untouched.
pub fn rmdir(ctx: &Context, path: &str) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let path_owned = path.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.rm_coll(session, &path_owned)
    });
    ctx.pool.release(&conn);

    match result {
        Err(CoreError::BackendErrno(code)) if code.abs() == libc::ENOTEMPTY => {
            return Err(CoreError::NotEmpty);
        }
        Err(e) => return Err(e),
        Ok(()) => {}
    }

    ctx.cache.remove_stat(path);
    ctx.cache.remove_dir(path);
    ctx.cache.remove_dir_entry2(path);
    Ok(())
}
