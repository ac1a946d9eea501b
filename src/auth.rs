use crate::config::IntrospectionConfig;
use crate::error::{AuthError, IntrospectionError, ServerError};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

const BASIC_PREFIX: &str = "Basic ";
const BEARER_PREFIX: &str = "Bearer ";

/// Expected Basic token, i.e. the Base64 form of `user:password`.
/// Empty disables authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    /// Encodes a plain `user:password` pair.
    pub fn from_plain(user_pass: &str) -> Self {
        if user_pass.is_empty() {
            return Self::default();
        }
        Self(general_purpose::STANDARD.encode(user_pass.as_bytes()))
    }

    /// Takes an already Base64-encoded token as is.
    pub fn from_encoded(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checks whether a bearer token is active.
#[async_trait]
pub trait Introspector: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<(), IntrospectionError>;
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
}

/// RFC 7662 style introspection over HTTP(S). Certificates of the
/// introspection endpoint are not verified.
pub struct HttpIntrospector {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    url: Option<Uri>,
    authorization: String,
    timeout: Duration,
}

impl HttpIntrospector {
    pub fn new(config: &IntrospectionConfig) -> Result<Self, ServerError> {
        let url = match &config.url {
            Some(url) if !url.is_empty() => Some(
                url.parse::<Uri>()
                    .map_err(|e| ServerError::Config(format!("Invalid introspection URL: {}", e)))?,
            ),
            _ => None,
        };

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| ServerError::Tls(format!("Failed to build introspection TLS connector: {}", e)))?;
        let connector = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));

        let account = format!("{}:{}", config.client_id, config.client_secret);
        let authorization = format!("{}{}", BASIC_PREFIX, general_purpose::STANDARD.encode(account.as_bytes()));

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            url,
            authorization,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn build_request(&self, url: &Uri, token: &str) -> Result<Request<Full<Bytes>>, IntrospectionError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", token)
            .append_pair("token_type_hint", "access_token")
            .finish();

        Request::builder()
            .method(Method::POST)
            .uri(url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(AUTHORIZATION, self.authorization.as_str())
            .body(Full::new(Bytes::from(form)))
            .map_err(|e| IntrospectionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Introspector for HttpIntrospector {
    async fn introspect(&self, token: &str) -> Result<(), IntrospectionError> {
        let url = self.url.as_ref().ok_or(IntrospectionError::NotConfigured)?;
        let request = self.build_request(url, token)?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| IntrospectionError::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| IntrospectionError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, IntrospectionError>((status, body))
        };

        let (status, body) = timeout(self.timeout, exchange)
            .await
            .map_err(|_| IntrospectionError::Timeout)??;

        info!(
            "Introspect status_code: {}, response: {}",
            status.as_u16(),
            String::from_utf8_lossy(&body)
        );

        if status != StatusCode::OK {
            return Err(IntrospectionError::Status(status.as_u16()));
        }

        let parsed: IntrospectionResponse = serde_json::from_slice(&body)
            .map_err(|e| IntrospectionError::MalformedResponse(e.to_string()))?;

        if parsed.active {
            Ok(())
        } else {
            Err(IntrospectionError::Inactive)
        }
    }
}

/// Decides whether a request may reach the protected routes.
pub struct AuthValidator {
    credentials: Credentials,
    introspector: Arc<dyn Introspector>,
}

impl AuthValidator {
    pub fn new(credentials: Credentials, introspector: Arc<dyn Introspector>) -> Self {
        Self {
            credentials,
            introspector,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// Checks the `Authorization` header and reports why it was rejected.
    pub async fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
        let value = value
            .to_str()
            .map_err(|e| AuthError::MalformedHeader(e.to_string()))?;

        if let Some(token) = value.strip_prefix(BEARER_PREFIX) {
            info!("Got Bearer auth");
            debug!("Introspect token: {}", token);
            return self.introspector.introspect(token).await.map_err(AuthError::from);
        }

        if !value.starts_with(BASIC_PREFIX) {
            return Err(AuthError::MalformedHeader(format!(
                "unsupported scheme in '{}'",
                value.split(' ').next().unwrap_or_default()
            )));
        }

        debug!("Matching {} with {}{}", value, BASIC_PREFIX, self.credentials.as_str());
        if value[BASIC_PREFIX.len()..] == *self.credentials.as_str() {
            Ok(())
        } else {
            Err(AuthError::CredentialMismatch)
        }
    }

    /// Collapses every failure to `false`.
    pub async fn authorize(&self, headers: &HeaderMap) -> bool {
        match self.check(headers).await {
            Ok(()) => true,
            Err(AuthError::MissingHeader) => {
                info!("No Authorization header present");
                false
            }
            Err(AuthError::Introspection(e)) => {
                warn!("Bearer token rejected: {}", e);
                false
            }
            Err(e) => {
                info!("Authorization rejected: {}", e);
                false
            }
        }
    }
}
