use crate::{AckError, Result};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::lookup_host;

/// A `host:port` target that is resolved when a client connects
///
/// The host may be a name such as `localhost` or a literal IP address.
/// IPv6 literals are written in brackets, e.g. `[::1]:4444`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the endpoint to one or more socket addresses
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| AckError::Resolve(format!("Failed to resolve {self}: {e}")))?
            .collect();

        if addrs.is_empty() {
            return Err(AckError::Resolve(format!("{self} resolved to no addresses")));
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for Endpoint {
    type Err = AckError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AckError::Config(format!("Missing port in endpoint: {s}")))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(|| {
                AckError::Config(format!("Unterminated IPv6 literal in endpoint: {s}"))
            })?,
            None if host.contains(':') => {
                return Err(AckError::Config(format!(
                    "IPv6 endpoints must be bracketed: {s}"
                )));
            }
            None => host,
        };

        if host.is_empty() {
            return Err(AckError::Config(format!("Missing host in endpoint: {s}")));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| AckError::Config(format!("Invalid port in endpoint {s}: {e}")))?;

        Ok(Endpoint::new(host, port))
    }
}
