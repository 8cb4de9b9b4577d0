#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use boomerang::controller::Boomerang;
use boomerang_common::config::Config;
use clap::Parser;

/// Durable, single-node, delayed HTTP callback scheduler.
#[derive(Debug, Parser)]
#[command(name = "boomerang")]
struct Args {
    /// Path to a TOML config file. Overrides the `BOOMERANG_CONFIG` env
    /// var and the default search locations.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the HTTP ingress port from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match find_config_file(args.config.as_deref())? {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("failed to read config from {}: {e}", path.display()))?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }

    Boomerang::new(config)?.run().await
}

/// Finds the configuration file using the following precedence:
/// 1. `--config PATH` CLI argument
/// 2. `BOOMERANG_CONFIG` environment variable
/// 3. `./boomerang.toml` (current working directory)
/// 4. `/etc/boomerang/boomerang.toml` (system-wide config)
///
/// Returns `Ok(None)` if none of these are set or exist, in which case the
/// caller runs with full defaults.
fn find_config_file(explicit: Option<&std::path::Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(Some(path.to_path_buf()))
        } else {
            anyhow::bail!("--config points to a non-existent file: {}", path.display())
        };
    }

    if let Ok(env_path) = std::env::var("BOOMERANG_CONFIG") {
        let path = PathBuf::from(env_path);
        return if path.exists() {
            Ok(Some(path))
        } else {
            anyhow::bail!("BOOMERANG_CONFIG points to a non-existent file: {}", path.display())
        };
    }

    for path in [
        PathBuf::from("./boomerang.toml"),
        PathBuf::from("/etc/boomerang/boomerang.toml"),
    ] {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}
