//! SSH port forwarding
//!
//! Runs `ssh -N -L <local>:<remote_host>:<remote_port>` as a child process and
//! waits until the local end accepts connections. Authentication is left to
//! ssh itself (agent or key files).

use super::{ConnectionError, ConnectionResult};
use crate::config::SshConfig;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// A running `ssh -L` forward, stopped on drop
#[derive(Debug)]
pub struct SshTunnel {
    child: Option<Child>,
    local_port: u16,
}

impl SshTunnel {
    /// Start forwarding a free local port to `remote_host:remote_port`
    pub fn open(config: &SshConfig, remote_host: &str, remote_port: u16) -> ConnectionResult<Self> {
        let local_port = free_local_port()?;
        let forward = format!(
            "{}:{}:{}:{}",
            Ipv4Addr::LOCALHOST,
            local_port,
            remote_host,
            remote_port
        );

        tracing::debug!(
            host = %config.host,
            user = %config.user,
            forward = %forward,
            "Starting SSH tunnel"
        );

        let child = Command::new(&config.program)
            .arg("-N")
            .args(["-o", "ExitOnForwardFailure=yes"])
            .args(["-o", "BatchMode=yes"])
            .args(["-p", &config.port.to_string()])
            .args(["-L", &forward])
            .arg(format!("{}@{}", config.user, config.host))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ConnectionError::Tunnel(format!("failed to spawn {}: {}", config.program, e))
            })?;

        let mut tunnel = Self {
            child: Some(child),
            local_port,
        };
        tunnel.wait_ready(Duration::from_secs(config.connect_timeout_secs))?;

        tracing::info!(
            "SSH tunnel {}@{} ready on local port {}",
            config.user,
            config.host,
            local_port
        );
        Ok(tunnel)
    }

    /// Local port the database is reachable on
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Stop the forward
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn wait_ready(&mut self, timeout: Duration) -> ConnectionResult<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.local_port));
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    return Err(ConnectionError::Tunnel(format!(
                        "ssh exited before the tunnel was ready ({})",
                        status
                    )));
                }
            }

            if TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                self.shutdown();
                return Err(ConnectionError::Tunnel(format!(
                    "local port {} not ready after {:?}",
                    self.local_port, timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::warn!("Failed to stop SSH tunnel: {}", e);
            }
            let _ = child.wait();
            tracing::debug!("SSH tunnel on port {} stopped", self.local_port);
        }
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Ask the OS for an unused local port
fn free_local_port() -> ConnectionResult<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_local_port() {
        let port = free_local_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn test_missing_ssh_program() {
        let config = SshConfig {
            program: "/nonexistent/ssh-binary".to_string(),
            ..SshConfig::default()
        };
        let err = SshTunnel::open(&config, "localhost", 3306).unwrap_err();
        assert!(matches!(err, ConnectionError::Tunnel(_)));
    }
}
