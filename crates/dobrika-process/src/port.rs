//! Port selection for the server under test.
//!
//! The reservation is best-effort: the probe socket is released before the
//! server binds, so another process can grab the port in between. The
//! harness accepts that race.

use dobrika_common::HarnessResult;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpSocket;
use tracing::debug;

/// Returns a port usable for binding, preferring `preferred` when it is free.
///
/// The preferred port is probed on the loopback interface with `SO_REUSEADDR`
/// set, so a port lingering in `TIME_WAIT` still counts as free. When there is
/// no preference, or the preferred port is taken, the OS assigns an ephemeral
/// port.
pub fn pick_free_port(preferred: Option<u16>) -> HarnessResult<u16> {
    if let Some(port) = preferred.filter(|p| *p != 0) {
        match probe_port(port) {
            Ok(()) => {
                debug!(port, "Preferred port is free");
                return Ok(port);
            }
            Err(e) => {
                debug!(port, error = %e, "Preferred port unavailable, falling back to ephemeral");
            }
        }
    }

    let port = ephemeral_port()?;
    debug!(port, "Using OS-assigned port");
    Ok(port)
}

fn probe_port(port: u16) -> std::io::Result<()> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))?;
    Ok(())
}

fn ephemeral_port() -> std::io::Result<u16> {
    let socket = TcpSocket::new_v4()?;
    socket.bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
    Ok(socket.local_addr()?.port())
}
