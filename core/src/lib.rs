//! Core subsystems of a FUSE daemon that exposes a remote object store
//! as a locally mounted POSIX tree: connection pooling, handle
//! tracking, metadata caching, and the filesystem operation layer that
//! composes them into the kernel upcall surface.
//!
//! This crate has no dependency on `fuser` or any other kernel-glue
//! library — see the `client` workspace member for that adapter — nor
//! on a concrete wire protocol, which lives behind the [`backend::Backend`]
//! trait (see the `backend-http` workspace member for one implementor).

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod fsops;
pub mod handle;
pub mod metadata_cache;
pub mod pool;
pub mod time;
pub mod timer;

pub use context::Context;
pub use error::{CoreError, CoreResult};
