use std::net::SocketAddr;

/// Options used by [`crate::MockService::init`]. The defaults are what tests
/// want almost always: loopback only and a port picked by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP listener bind address. Port 0 lets the OS choose a free port,
    /// which keeps parallel tests from colliding.
    pub listen: SocketAddr,

    /// Maximum number of pending connections in the accept queue.
    pub backlog: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default::listen(),
            backlog: default::backlog(),
        }
    }
}

mod default {
    //! Default values for configuration options.

    use std::net::{Ipv4Addr, SocketAddr};

    pub fn listen() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    pub fn backlog() -> u32 {
        1024
    }
}
