use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Transport layer for ZeroMQ connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Inter-process communication via Unix domain sockets.
    /// Fastest option for same-host agent/broker pairs.
    Ipc(String),

    /// TCP transport for agents on remote hosts.
    Tcp { host: String, port: u16 },
}

impl Transport {
    /// Create an IPC transport with the given socket name.
    ///
    /// The name is used as a path component under `/tmp/watchdog/`.
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(name.to_string())
    }

    /// Create a TCP transport with the given host and port.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Parse an endpoint URL of the form `tcp://host:port` or `ipc://name`.
    pub fn parse(endpoint: &str) -> Result<Self, BusError> {
        if let Some(rest) = endpoint.strip_prefix("tcp://") {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| BusError::Transport(format!("missing port in '{endpoint}'")))?;
            let port: u16 = port
                .parse()
                .map_err(|_| BusError::Transport(format!("invalid port in '{endpoint}'")))?;
            if host.is_empty() {
                return Err(BusError::Transport(format!("missing host in '{endpoint}'")));
            }
            Ok(Self::tcp(host, port))
        } else if let Some(name) = endpoint.strip_prefix("ipc://") {
            if name.is_empty() {
                return Err(BusError::Transport(format!("missing name in '{endpoint}'")));
            }
            Ok(Self::ipc(name))
        } else {
            Err(BusError::Transport(format!(
                "unsupported endpoint scheme: '{endpoint}'"
            )))
        }
    }

    /// Generate the ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(name) => format!("ipc:///tmp/watchdog/{name}.sock"),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_endpoint() {
        let t = Transport::ipc("broker");
        assert_eq!(t.endpoint(), "ipc:///tmp/watchdog/broker.sock");
    }

    #[test]
    fn tcp_endpoint() {
        let t = Transport::tcp("127.0.0.1", 5555);
        assert_eq!(t.endpoint(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn parse_tcp() {
        let t = Transport::parse("tcp://10.0.0.2:5556").unwrap();
        assert_eq!(t, Transport::tcp("10.0.0.2", 5556));
    }

    #[test]
    fn parse_ipc() {
        let t = Transport::parse("ipc://agent-bus").unwrap();
        assert_eq!(t, Transport::ipc("agent-bus"));
    }

    #[test]
    fn parse_rejects_bad_scheme() {
        assert!(Transport::parse("http://localhost:80").is_err());
    }

    #[test]
    fn parse_rejects_missing_port() {
        assert!(Transport::parse("tcp://localhost").is_err());
    }

    #[test]
    fn display_matches_endpoint() {
        let t = Transport::tcp("localhost", 9090);
        assert_eq!(t.to_string(), t.endpoint());
    }
}
