//! Singleton guard.
//!
//! An exclusive bind on a sentinel loopback port. If a second stagehand is
//! already holding the port the bind fails and startup aborts, which keeps
//! two instances from contending for the DAW ports.

use std::net::TcpListener;

use anyhow::{Context, Result};

/// Holds the sentinel socket for the life of the process.
pub struct SingletonGuard {
    _listener: TcpListener,
    port: u16,
}

impl SingletonGuard {
    pub fn acquire(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).with_context(|| {
            format!(
                "another stagehand instance appears to be running (sentinel port {} is taken)",
                port
            )
        })?;
        Ok(Self {
            _listener: listener,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        // Bind port 0 first to get a free port, then race on it.
        let probe = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let first = SingletonGuard::acquire(port).expect("first acquire");
        assert_eq!(first.port(), port);
        assert!(SingletonGuard::acquire(port).is_err());

        drop(first);
        assert!(SingletonGuard::acquire(port).is_ok());
    }
}
