//! The FUSE client binary: parses CLI flags, builds the backend and
//! `core::Context`, then mounts (spec.md §1, §6 "CLI surface").
//!
//! Grounded on the teacher's `client/src/main.rs` (argv mountpoint,
//! `RemoteFS::new()`, `fuser::mount2` with `AutoUnmount`/`FSName`),
//! generalized with a real CLI parser, config layering, daemonizing,
//! and mountpoint sanity checks per spec.md §6/§7.

mod cli;
mod fuse_adapter;
mod inode;

use std::fs;
use std::sync::Arc;

use clap::Parser;
use fuser::MountOption;

use remotefs_backend_http::client_backend::HttpBackend;
use remotefs_core::Context;

use cli::Cli;
use fuse_adapter::RemoteFsAdapter;

fn check_mountpoint(path: &std::path::Path) -> anyhow::Result<()> {
    let meta = fs::metadata(path).map_err(|e| anyhow::anyhow!("mountpoint {:?}: {}", path, e))?;
    if !meta.is_dir() {
        anyhow::bail!("mountpoint {:?} is not a directory", path);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.debug {
            "remotefs_client=debug,remotefs_core=debug"
        } else {
            "remotefs_client=info,remotefs_core=info"
        })
        .init();

    check_mountpoint(&cli.mountpoint)?;

    if !cli.foreground {
        daemonize::Daemonize::new()
            .start()
            .map_err(|e| anyhow::anyhow!("failed to daemonize: {}", e))?;
    }

    let config = cli::build_config(&cli);
    let server = cli::server_url(&cli);

    let runtime = tokio::runtime::Runtime::new()?;
    let backend = Arc::new(HttpBackend::new(server));
    let ctx = Context::init(config, backend, runtime.handle().clone());

    let adapter = RemoteFsAdapter::new(ctx.clone());
    let options = vec![
        MountOption::AutoUnmount,
        MountOption::FSName("remotefs".to_string()),
    ];

    tracing::info!("mounting at {:?}", cli.mountpoint);
    let result = fuser::mount2(adapter, &cli.mountpoint, &options);
    ctx.destroy();
    result.map_err(|e| anyhow::anyhow!("mount failed: {}", e))
}
