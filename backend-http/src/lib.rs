//! HTTP implementation of `remotefs_core::backend::Backend`, plus the
//! axum server exposing the same surface (spec.md §6 "Backend client
//! interface"). The `main` binary runs the server half; `client_backend`
//! is linked into the `remotefs` FUSE client binary for the client half.

pub mod client_backend;
pub mod handlers;
pub mod wire;
