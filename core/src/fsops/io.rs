//! open, close, read, write, flush (spec.md §4.5).

use std::sync::Arc;

use crate::config::OpKind;
use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::fsops::envelope;
use crate::handle::FileHandle;

fn is_read_only(flags: i32) -> bool {
    flags & libc::O_ACCMODE == libc::O_RDONLY
}

/// spec.md §4.5 `open(p, flags)`.
pub fn open(ctx: &Context, path: &str, flags: i32) -> CoreResult<Arc<FileHandle>> {
    let class = ctx.config.class_for(OpKind::LongLived);
    let conn = ctx.pool.acquire(class)?;
    let handle = ctx
        .handles
        .open_file(&ctx.pool, ctx.backend.as_ref(), &ctx.runtime, conn.clone(), path, flags)
        .inspect_err(|_| ctx.pool.release(&conn))?;
    if !is_read_only(flags) {
        ctx.cache.remove_stat(path);
    }
    Ok(handle)
}

/// spec.md §4.5 `close(F)`: closes the backend fd, then releases the
/// handle's connection, then (for a write-capable handle) drops the
/// stat cache entry.
pub fn close(ctx: &Context, handle: &Arc<FileHandle>) {
    ctx.handles.close_file(ctx.backend.as_ref(), &ctx.runtime, handle);
    ctx.pool.release(&handle.conn);
    if !is_read_only(handle.open_flags) {
        ctx.cache.remove_stat(&handle.path);
    }
}

/// Issues an `lseek` if the handle's last known position doesn't match
/// `off` (spec.md §4.5 read/write preamble). A mismatched post-seek
/// offset is treated as a corruption signal and surfaces as `ENOENT`.
/// Callers must already hold `handle.io_lock`.
fn seek_if_needed(ctx: &Context, handle: &Arc<FileHandle>, off: i64) -> CoreResult<()> {
    let current = *handle.last_file_pointer.lock().unwrap();
    if current == off {
        return Ok(());
    }
    let bfd = *handle.bfd.lock().unwrap();
    let result = envelope(
        ctx.backend.as_ref(),
        &ctx.pool,
        &ctx.runtime,
        &handle.conn,
        ctx.config.rods_api_timeout_sec,
        move |backend, session| backend.data_obj_lseek(session, bfd, off),
    )?;
    if result != off {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

/// spec.md §4.5 `read(F, off, size)`: `lock(F)` held across the seek and
/// the data RPC (spec.md §4.4, §5 "two reads on the same F are strictly
/// serialized").
pub fn read(ctx: &Context, handle: &Arc<FileHandle>, off: i64, size: usize) -> CoreResult<bytes::Bytes> {
    let _io_guard = handle.io_lock.lock().unwrap();
    seek_if_needed(ctx, handle, off)?;
    let bfd = *handle.bfd.lock().unwrap();
    let data = envelope(
        ctx.backend.as_ref(),
        &ctx.pool,
        &ctx.runtime,
        &handle.conn,
        ctx.config.rods_api_timeout_sec,
        move |backend, session| backend.data_obj_read(session, bfd, size),
    )?;
    *handle.last_file_pointer.lock().unwrap() = off + data.len() as i64;
    Ok(data)
}

/// spec.md §4.5 `write(F, off, size)`: `lock(F)` held across the seek
/// and the data RPC, same as `read`.
pub fn write(ctx: &Context, handle: &Arc<FileHandle>, off: i64, data: &[u8]) -> CoreResult<usize> {
    let _io_guard = handle.io_lock.lock().unwrap();
    seek_if_needed(ctx, handle, off)?;
    let bfd = *handle.bfd.lock().unwrap();
    let owned = data.to_vec();
    let written = envelope(
        ctx.backend.as_ref(),
        &ctx.pool,
        &ctx.runtime,
        &handle.conn,
        ctx.config.rods_api_timeout_sec,
        move |backend, session| backend.data_obj_write(session, bfd, &owned),
    )?;
    *handle.last_file_pointer.lock().unwrap() = off + written as i64;
    Ok(written)
}

/// spec.md §4.5 `flush(F)`: reopen in place, then invalidate the
/// handle's stat cache entry.
pub fn flush(ctx: &Context, handle: &Arc<FileHandle>) -> CoreResult<()> {
    ctx.handles.reopen_file(&ctx.pool, ctx.backend.as_ref(), &ctx.runtime, handle)?;
    ctx.cache.remove_stat(&handle.path);
    Ok(())
}
