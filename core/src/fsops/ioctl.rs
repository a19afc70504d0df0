//! ioctl (spec.md §4.5, §6). Only two command numbers are recognized;
//! everything else maps to `-EINVAL`.

use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::pool::PoolReport;

/// `RESET_METADATA_CACHE` and `SHOW_CONNECTIONS` (spec.md §6 "ioctl
/// command numbers").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCommand {
    ResetMetadataCache,
    ShowConnections,
}

impl IoctlCommand {
    pub fn from_raw(cmd: i64) -> Option<Self> {
        match cmd {
            1 => Some(IoctlCommand::ResetMetadataCache),
            2 => Some(IoctlCommand::ShowConnections),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum IoctlResult {
    Cleared,
    Connections(PoolReport),
}

/// spec.md §6 `SHOW_CONNECTIONS` writes `{inUseShortOp, inUseGeneral,
/// inUseOnetime, freeShortOp + freeGeneral}`, which is exactly
/// `PoolReport`'s shape.
pub fn ioctl(ctx: &Context, cmd: IoctlCommand) -> CoreResult<IoctlResult> {
    match cmd {
        IoctlCommand::ResetMetadataCache => {
            ctx.cache.clear();
            Ok(IoctlResult::Cleared)
        }
        IoctlCommand::ShowConnections => Ok(IoctlResult::Connections(ctx.pool.report())),
    }
}

/// Entry point matching the raw external `ioctl(path, cmd, ...)`
/// surface (spec.md §6): unrecognized command numbers return
/// `-EINVAL` instead of panicking.
pub fn ioctl_raw(ctx: &Context, raw_cmd: i64) -> CoreResult<IoctlResult> {
    match IoctlCommand::from_raw(raw_cmd) {
        Some(cmd) => ioctl(ctx, cmd),
        None => Err(CoreError::InvalidArgument),
    }
}
