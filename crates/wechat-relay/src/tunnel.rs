//! Launches the tunnel client (natapp, frpc, ...) that exposes the local port
//! to WeChat's servers.
//!
//! The child is tied to the returned handle: dropping it kills the tunnel, so
//! the tunnel goes away with the relay. It is not restarted if it exits.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::config::TunnelConfig;

/// Spawns `config.command`, split on whitespace into program and arguments.
/// Output is discarded.
pub fn spawn(config: &TunnelConfig) -> io::Result<Child> {
    let mut parts = config.command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty tunnel command"))?;

    let child = Command::new(program)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    tracing::info!(program, pid = child.id(), "Tunnel process started");
    Ok(child)
}
