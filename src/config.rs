use crate::auth::Credentials;
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8181;
pub const DEFAULT_MUTUAL_HTTPS_PORT: u16 = 8282;
pub const DEFAULT_MANAGEMENT_PORT: u16 = 8383;
pub const DEFAULT_SERVER_CERTIFICATE: &str = "/etc/ssl/certs/dummy.crt";
pub const DEFAULT_CLIENT_CA: &str = "/etc/ssl/certs/dummy_ca.crt";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<LogLevel>,
    pub format: Option<LogFormat>,
}

/// Where bearer tokens are checked and with which service account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_client_secret")]
    pub client_secret: String,
    #[serde(default = "default_introspection_timeout")]
    pub timeout_secs: u64,
}

fn default_client_id() -> String {
    "dummyUser".to_string()
}

fn default_client_secret() -> String {
    "dummyPass".to_string()
}

fn default_introspection_timeout() -> u64 {
    10
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            timeout_secs: default_introspection_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: IpAddr,
    pub http_port: u16,
    pub https_port: u16,
    pub mutual_https_port: u16,
    pub management_port: u16,
    // When false only the HTTP and management endpoints are started
    pub tls_enabled: bool,
    /// Plain `user:password`; empty disables authentication.
    pub credentials: String,
    pub server_certificate: String,
    // Defaults to `server_certificate`, which may then hold key and chain
    pub server_private_key: Option<String>,
    pub client_ca: String,
    pub introspection: IntrospectionConfig,
    pub logging: Option<LoggingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            mutual_https_port: DEFAULT_MUTUAL_HTTPS_PORT,
            management_port: DEFAULT_MANAGEMENT_PORT,
            tls_enabled: true,
            credentials: String::new(),
            server_certificate: DEFAULT_SERVER_CERTIFICATE.to_string(),
            server_private_key: None,
            client_ca: DEFAULT_CLIENT_CA.to_string(),
            introspection: IntrospectionConfig::default(),
            logging: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("Failed to read configuration file {}: {}", path, e)))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<(), ServerError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_address, port)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::from_plain(&self.credentials)
    }

    pub fn private_key_path(&self) -> &str {
        self.server_private_key
            .as_deref()
            .unwrap_or(&self.server_certificate)
    }
}
