use crate::auth::{AuthValidator, Credentials, Introspector};
use crate::chaos::ChaosPolicy;
use crate::error::BodyError;
use crate::response::ResponseBuilder;
use crate::state::SharedState;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::header::{CONTENT_LENGTH, HeaderMap};
use hyper::{Method, Request, Response, StatusCode, Uri};
use log::{debug, error, info};
use std::sync::Arc;

pub const FAIL_PATH: &str = "/fail";
pub const DELAYED_PATH: &str = "/delayed";
pub const STATS_PATH: &str = "/stats";
pub const HISTORY_PATH: &str = "/history";
pub const CLEAR_PATH: &str = "/clear";

/// Serves one request of a connection.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>>;
}

/// Everything a [`RequestHandler`] needs besides the shared state.
pub struct HandlerConfig {
    pub credentials: Credentials,
    pub introspector: Arc<dyn Introspector>,
    pub chaos: Arc<dyn ChaosPolicy>,
}

// Routes compare against the full request target, query string included.
fn request_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Reads the body announced by `Content-Length`. Without the header, or with
/// a zero length, the body is empty.
async fn read_body<B>(headers: &HeaderMap, body: B) -> Result<String, BodyError>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let length = match headers.get(CONTENT_LENGTH) {
        None => return Ok(String::new()),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .ok_or_else(|| BodyError::InvalidLength(String::from_utf8_lossy(value.as_bytes()).into_owned()))?,
    };
    if length == 0 {
        return Ok(String::new());
    }

    let bytes = body
        .collect()
        .await
        .map_err(|e| BodyError::Read(e.to_string()))?
        .to_bytes();
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// An empty body counts as valid.
fn validate_json(body: &str) -> Result<(), BodyError> {
    if body.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde::de::IgnoredAny>(body)?;
    Ok(())
}

/// Serves the plain, TLS and mutual TLS endpoints.
pub struct RequestHandler {
    auth: AuthValidator,
    chaos: Arc<dyn ChaosPolicy>,
    state: Arc<SharedState>,
}

impl RequestHandler {
    pub fn new(config: HandlerConfig, state: Arc<SharedState>) -> Self {
        Self {
            auth: AuthValidator::new(config.credentials, config.introspector),
            chaos: config.chaos,
            state,
        }
    }

    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();

        if parts.method != Method::GET && parts.method != Method::POST {
            debug!("Unsupported method {} for {}", parts.method, parts.uri);
            return ResponseBuilder::empty(StatusCode::NOT_IMPLEMENTED);
        }

        let path = request_path(&parts.uri);
        let mut recorded_body = String::new();

        let response = if path == FAIL_PATH {
            let code = self.chaos.failure_code();
            debug!("Injecting failure {} for {} {}", code, parts.method, path);
            ResponseBuilder::from_code(code)
        } else if path == DELAYED_PATH {
            let delay = self.chaos.delay();
            debug!("Delaying {} {} by {:?}", parts.method, path, delay);
            tokio::time::sleep(delay).await;
            ResponseBuilder::empty(StatusCode::INTERNAL_SERVER_ERROR)
        } else if !self.auth.authorize(&parts.headers).await {
            ResponseBuilder::unauthorized()
        } else if parts.method == Method::POST {
            match read_body(&parts.headers, body).await {
                Ok(text) => {
                    let validation = validate_json(&text);
                    recorded_body = text;
                    match validation {
                        Ok(()) => ResponseBuilder::empty(StatusCode::OK),
                        Err(e) => {
                            debug!("Rejecting POST {}: {}", path, e);
                            ResponseBuilder::empty(StatusCode::BAD_REQUEST)
                        }
                    }
                }
                Err(e) => {
                    debug!("Rejecting POST {}: {}", path, e);
                    ResponseBuilder::empty(StatusCode::BAD_REQUEST)
                }
            }
        } else {
            ResponseBuilder::empty(StatusCode::OK)
        };

        info!("{} {} -> {}", parts.method, path, response.status().as_u16());
        self.state.record(&path, parts.method.as_str(), &recorded_body, header_pairs(&parts.headers));

        response
    }
}

#[async_trait]
impl Handler for RequestHandler {
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        self.handle_request(req).await
    }
}

/// Exposes and resets the shared state. Never records requests.
pub struct ManagementHandler {
    state: Arc<SharedState>,
}

impl ManagementHandler {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    pub fn handle_request<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        if req.method() != Method::GET {
            return ResponseBuilder::empty(StatusCode::NOT_IMPLEMENTED);
        }

        let path = request_path(req.uri());
        let body = match path.as_str() {
            STATS_PATH => self.state.stats_json(),
            HISTORY_PATH => self.state.history_json(),
            CLEAR_PATH => {
                self.state.clear();
                info!("Cleared request stats and history");
                Ok(String::new())
            }
            _ => Ok(String::new()),
        };

        match body {
            Ok(body) => ResponseBuilder::json(StatusCode::OK, body),
            Err(e) => {
                error!("Failed to serialize {}: {}", path, e);
                ResponseBuilder::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[async_trait]
impl Handler for ManagementHandler {
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        self.handle_request(&req)
    }
}
