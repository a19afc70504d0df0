//! rename (spec.md §4.5).

use crate::config::OpKind;
use crate::context::Context;
use crate::error::CoreResult;
use crate::fsops::envelope;

/// spec.md §4.5 `rename(from, to)`. Per S7, both endpoints' stat
/// entries are misses after this returns, forcing the next `getattr`
/// to refresh from the backend.
pub fn rename(ctx: &Context, from: &str, to: &str) -> CoreResult<()> {
    let class = ctx.config.class_for(OpKind::ShortLived);
    let conn = ctx.pool.acquire(class)?;
    let from_owned = from.to_string();
    let to_owned = to.to_string();
    let result = envelope(ctx.backend.as_ref(), &ctx.pool, &ctx.runtime, &conn, ctx.config.rods_api_timeout_sec, move |backend, session| {
        backend.data_obj_rename(session, &from_owned, &to_owned)
    });
    ctx.pool.release(&conn);
    result?;

    ctx.cache.remove_stat(from);
    ctx.cache.remove_stat(to);
    ctx.cache.remove_dir(from);
    ctx.cache.remove_dir(to);
    ctx.cache.remove_dir_entry2(from);
    ctx.cache.add_dir_entry_if_fresh2(to);
    Ok(())
}
