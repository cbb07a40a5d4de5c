//! Database connection strings stored in cluster secrets

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use url::Url;

use crate::error::{CoreError, Result};

/// A database connection URI pointed at the local tunnel endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUri {
    url: Url,
}

impl DatabaseUri {
    /// Parse a plain connection string
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri.trim()).map_err(|e| CoreError::InvalidDatabaseUri {
            message: e.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(CoreError::InvalidDatabaseUri {
                message: "connection string has no host".to_string(),
            });
        }
        Ok(Self { url })
    }

    /// Decode the base64 value of a secret key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::InvalidDatabaseUri {
                message: format!("secret value is not base64: {}", e),
            })?;
        let decoded = String::from_utf8(bytes).map_err(|e| CoreError::InvalidDatabaseUri {
            message: format!("secret value is not UTF-8: {}", e),
        })?;
        Self::parse(&decoded)
    }

    /// Rewrite host and port; the database is only reachable through the tunnel
    pub fn tunneled(mut self, host: &str, port: u16) -> Result<Self> {
        let failed = |what: &str| CoreError::InvalidDatabaseUri {
            message: format!("cannot rewrite {} of the connection string", what),
        };
        self.url.set_host(Some(host)).map_err(|_| failed("host"))?;
        self.url.set_port(Some(port)).map_err(|_| failed("port"))?;
        Ok(self)
    }

    /// Database name (the URI path without its leading slash)
    pub fn database(&self) -> Option<&str> {
        let name = self.url.path().trim_start_matches('/');
        (!name.is_empty()).then_some(name)
    }

    /// Point the connection string at another database on the same server
    pub fn with_database(mut self, database: &str) -> Self {
        self.url.set_path(&format!("/{}", database));
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for DatabaseUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
