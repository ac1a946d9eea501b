use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why an `Authorization` header was rejected.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no Authorization header present")]
    MissingHeader,

    #[error("malformed Authorization header: {0}")]
    MalformedHeader(String),

    #[error("credentials do not match")]
    CredentialMismatch,

    #[error("token introspection failed: {0}")]
    Introspection(#[from] IntrospectionError),
}

#[derive(Error, Debug)]
pub enum IntrospectionError {
    #[error("no introspection URL configured")]
    NotConfigured,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("introspection request timed out")]
    Timeout,

    #[error("introspection endpoint answered with status {0}")]
    Status(u16),

    #[error("malformed introspection response: {0}")]
    MalformedResponse(String),

    #[error("token is not active")]
    Inactive,
}

/// Why a POST body was rejected with 400.
#[derive(Error, Debug)]
pub enum BodyError {
    #[error("invalid Content-Length: {0}")]
    InvalidLength(String),

    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("request body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
