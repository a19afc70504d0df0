//! Command-line surface (spec.md §6 "CLI surface" / "Environment
//! variables"): flags take priority over environment variables, which
//! take priority over `Config::default()`.
//!
//! Grounded on the teacher's `config.rs` (a flat, serde-deserialized
//! config struct with a documented default), generalized from a single
//! TOML-file load into the CLI+env+default layering spec.md calls for.

use std::path::PathBuf;

use clap::Parser;
use remotefs_core::config::Config;

#[derive(Parser, Debug)]
#[command(name = "remotefs", version, about = "Mount a remote object store as a local POSIX tree")]
pub struct Cli {
    /// Local directory to mount at.
    pub mountpoint: PathBuf,

    /// Enable FUSE debug logging.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Stay in the foreground instead of daemonizing.
    #[arg(short = 'f', long)]
    pub foreground: bool,

    /// Backend session ticket.
    #[arg(short = 't', long)]
    pub ticket: Option<String>,

    /// Remote working directory / home collection.
    #[arg(short = 'w', long)]
    pub workdir: Option<String>,

    /// Base URL of the backend server.
    #[arg(long)]
    pub server: Option<String>,

    /// Disable the external buffered direct-I/O layer.
    #[arg(long)]
    pub nodirectio: bool,
    /// Disable the external read cache.
    #[arg(long)]
    pub nocache: bool,
    /// Disable read-ahead preloading.
    #[arg(long)]
    pub nopreload: bool,
    /// Disable metadata caching (stat and directory-entry TTL forced to 0).
    #[arg(long)]
    pub nocachemetadata: bool,
    /// Use pooled connection classes for short-lived and long-lived ops.
    #[arg(long)]
    pub connreuse: bool,
    /// Force one-time-use connections even where pooling would apply.
    #[arg(long)]
    pub noconnreuse: bool,

    #[arg(long)]
    pub maxconn: Option<u32>,
    #[arg(long)]
    pub blocksize: Option<u32>,
    #[arg(long)]
    pub conntimeout: Option<u64>,
    #[arg(long)]
    pub connkeepalive: Option<u64>,
    #[arg(long)]
    pub conncheckinterval: Option<u64>,
    #[arg(long)]
    pub apitimeout: Option<u64>,
    #[arg(long)]
    pub preloadblocks: Option<u32>,
    #[arg(long)]
    pub metadatacachetimeout: Option<u64>,
}

/// Case-insensitive `"true"` test (spec.md §6 "Truthy = case-insensitive
/// `true`").
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| v.eq_ignore_ascii_case("true"))
}

/// Base-10 parse with the env var treated as absent on a malformed
/// value (spec.md §6 "invalid values fall back to defaults").
fn env_num<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Resolves CLI flags, then environment variables, then
/// `Config::default()`, into one `Config` (spec.md §6).
pub fn build_config(cli: &Cli) -> Config {
    let mut config = Config::default();

    config.conn_reuse = if cli.connreuse {
        true
    } else if cli.noconnreuse {
        false
    } else if let Some(true) = env_flag("IRODSFS_NOCONNREUSE") {
        false
    } else if let Some(v) = env_flag("IRODSFS_CONNREUSE") {
        v
    } else {
        config.conn_reuse
    };

    config.max_conn = cli.maxconn.or_else(|| env_num("IRODSFS_MAXCONN")).unwrap_or(config.max_conn);
    config.block_size = cli.blocksize.or_else(|| env_num("IRODSFS_BLOCKSIZE")).unwrap_or(config.block_size);
    config.conn_timeout_sec = cli
        .conntimeout
        .or_else(|| env_num("IRODSFS_CONNTIMEOUT"))
        .unwrap_or(config.conn_timeout_sec);
    config.conn_keep_alive_sec = cli
        .connkeepalive
        .or_else(|| env_num("IRODSFS_CONNKEEPALIVE"))
        .unwrap_or(config.conn_keep_alive_sec);
    config.conn_check_interval_sec = cli
        .conncheckinterval
        .or_else(|| env_num("IRODSFS_CONNCHECKINTERVAL"))
        .unwrap_or(config.conn_check_interval_sec);
    config.rods_api_timeout_sec = cli
        .apitimeout
        .or_else(|| env_num("IRODSFS_APITIMEOUT"))
        .unwrap_or(config.rods_api_timeout_sec);
    config.preload_num_blocks = cli
        .preloadblocks
        .or_else(|| env_num("IRODSFS_PRELOADBLOCKS"))
        .unwrap_or(config.preload_num_blocks);
    config.metadata_cache_timeout_sec = cli
        .metadatacachetimeout
        .or_else(|| env_num("IRODSFS_METADATACACHETIMEOUT"))
        .unwrap_or(config.metadata_cache_timeout_sec);

    let nopreload = cli.nopreload || matches!(env_flag("IRODSFS_NOPRELOAD"), Some(true));
    if nopreload {
        config.preload_num_blocks = 0;
    }
    let nocachemetadata = cli.nocachemetadata || matches!(env_flag("IRODSFS_NOCACHEMETADATA"), Some(true));
    if nocachemetadata {
        config.metadata_cache_timeout_sec = 0;
    }

    config.ticket = cli.ticket.clone().or(config.ticket);
    config.workdir = cli.workdir.clone().unwrap_or(config.workdir);

    config
}

/// Resolves the backend server's base URL: CLI flag, then
/// `IRODSFS_SERVER`, then a localhost default for local testing.
pub fn server_url(cli: &Cli) -> String {
    cli.server
        .clone()
        .or_else(|| std::env::var("IRODSFS_SERVER").ok())
        .unwrap_or_else(|| "http://127.0.0.1:8080".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(mountpoint: &str) -> Cli {
        Cli {
            mountpoint: PathBuf::from(mountpoint),
            debug: false,
            foreground: false,
            ticket: None,
            workdir: None,
            server: None,
            nodirectio: false,
            nocache: false,
            nopreload: false,
            nocachemetadata: false,
            connreuse: false,
            noconnreuse: false,
            maxconn: None,
            blocksize: None,
            conntimeout: None,
            connkeepalive: None,
            conncheckinterval: None,
            apitimeout: None,
            preloadblocks: None,
            metadatacachetimeout: None,
        }
    }

    #[test]
    fn defaults_match_config_default() {
        let config = build_config(&cli("/mnt"));
        assert_eq!(config.max_conn, Config::default().max_conn);
        assert!(!config.conn_reuse);
    }

    #[test]
    fn connreuse_flag_overrides_default() {
        let mut c = cli("/mnt");
        c.connreuse = true;
        assert!(build_config(&c).conn_reuse);
    }

    #[test]
    fn explicit_maxconn_is_honored() {
        let mut c = cli("/mnt");
        c.maxconn = Some(7);
        assert_eq!(build_config(&c).max_conn, 7);
    }

    #[test]
    fn nocachemetadata_forces_zero_ttl() {
        let mut c = cli("/mnt");
        c.nocachemetadata = true;
        assert_eq!(build_config(&c).metadata_cache_timeout_sec, 0);
    }
}
