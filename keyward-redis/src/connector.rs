//! Redis connection factory for keyward pools.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use keyward_core::{Connection, Manager, StoreResult};
use redis::Client;
use tracing::{debug, trace};

use crate::connection::RedisConnection;
use crate::error::Error;

const DEFAULT_PORT: u16 = 6379;

/// Opens and probes Redis connections on behalf of a [`keyward_core::Pool`].
///
/// Each pooled connection is a separate multiplexed TCP connection, so a
/// broken socket only takes down the lease that was using it.
#[derive(Clone, Debug)]
pub struct RedisConnector {
    client: Client,
    address: String,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl RedisConnector {
    /// Creates new RedisConnector builder with default settings.
    #[must_use]
    pub fn builder() -> RedisConnectorBuilder {
        RedisConnectorBuilder::default()
    }

    /// Address (`host:port` or URL without credentials) used in logs.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Manager for RedisConnector {
    type Connection = RedisConnection;

    async fn create(&self) -> StoreResult<RedisConnection> {
        trace!(address = %self.address, "Opening redis connection");
        let connection = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| Error::Timeout(self.connect_timeout))?
        .map_err(Error::from)?;
        debug!(address = %self.address, "Redis connection established");
        Ok(RedisConnection::new(connection, self.response_timeout))
    }

    async fn check(&self, connection: &mut RedisConnection) -> StoreResult<()> {
        connection.ping().await
    }
}

/// Part of builder pattern implementation for RedisConnector.
#[derive(Clone)]
pub struct RedisConnectorBuilder {
    server: Option<String>,
    host: Option<String>,
    port: u16,
    password: Option<String>,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl Default for RedisConnectorBuilder {
    fn default() -> Self {
        Self {
            server: None,
            host: None,
            port: DEFAULT_PORT,
            password: None,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConnectorBuilder {
    /// Set full connection URL (`redis://...` or `rediss://...`).
    ///
    /// Takes precedence over [`host`](Self::host), [`port`](Self::port) and
    /// [`password`](Self::password).
    pub fn server(mut self, url: impl Into<String>) -> Self {
        self.server = Some(url.into());
        self
    }

    /// Set host name or IP address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set TCP port (default 6379).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set password sent with `AUTH` on connect.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Accepts `redis://` URLs, `host:port` pairs and bare host names.
    pub fn endpoint(self, endpoint: &str) -> Self {
        if endpoint.contains("://") {
            return self.server(endpoint);
        }
        match endpoint.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => match port.parse() {
                Ok(port) => self.host(host).port(port),
                Err(_) => self.host(endpoint),
            },
            _ => self.host(endpoint),
        }
    }

    /// Set timeout for establishing a connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set timeout for a single command reply.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Create new instance of RedisConnector with passed settings.
    pub fn build(self) -> Result<RedisConnector, Error> {
        let (url, address) = match (self.server, self.host) {
            (Some(url), _) => {
                let address = redact(&url);
                (url, address)
            }
            (None, Some(host)) => {
                let address = format!("{host}:{}", self.port);
                let url = match &self.password {
                    Some(password) => format!(
                        "redis://:{}@{host}:{}/",
                        encode_userinfo(password),
                        self.port
                    ),
                    None => format!("redis://{address}/"),
                };
                (url, address)
            }
            (None, None) => return Err(Error::MissingHost),
        };

        Ok(RedisConnector {
            client: Client::open(url)?,
            address,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
        })
    }
}

/// Drops credentials from a URL before it reaches logs.
fn redact(url: &str) -> String {
    match (url.split_once("://"), url.rfind('@')) {
        (Some((scheme, _)), Some(at)) => format!("{scheme}://{}", &url[at + 1..]),
        _ => url.to_owned(),
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_userinfo(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}
