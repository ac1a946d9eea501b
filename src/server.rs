use crate::auth::HttpIntrospector;
use crate::chaos::RandomChaos;
use crate::config::Config;
use crate::error::ServerError;
use crate::handler::{Handler, HandlerConfig, ManagementHandler, RequestHandler};
use crate::state::SharedState;
use crate::tls;
use hyper::server::conn::http1::Builder as ServerBuilder;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{Duration, sleep};
use tokio_rustls::TlsAcceptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Http,
    Https,
    MutualHttps,
    Management,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Http => write!(f, "HTTP"),
            EndpointKind::Https => write!(f, "HTTPS"),
            EndpointKind::MutualHttps => write!(f, "HTTPS mutual authentication"),
            EndpointKind::Management => write!(f, "management"),
        }
    }
}

/// A bound listener plus the handler its connections are served with.
pub struct Endpoint {
    kind: EndpointKind,
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    handler: Arc<dyn Handler>,
}

impl Endpoint {
    pub async fn bind(
        kind: EndpointKind,
        addr: SocketAddr,
        acceptor: Option<TlsAcceptor>,
        handler: Arc<dyn Handler>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Config(format!("Failed to bind {} endpoint to {}: {}", kind, addr, e)))?;

        Ok(Self {
            kind,
            listener,
            acceptor,
            handler,
        })
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        let scheme = if self.acceptor.is_some() { "https" } else { "http" };
        info!("Serving {} server on: {}://{}", self.kind, scheme, self.local_addr()?);

        loop {
            let (tcp_stream, remote_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept {} connection: {}", self.kind, e);
                    sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            let kind = self.kind;
            let acceptor = self.acceptor.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                debug!("{} connection established from: {}", kind, remote_addr);
                match acceptor {
                    Some(acceptor) => match acceptor.accept(tcp_stream).await {
                        Ok(tls_stream) => serve_connection(TokioIo::new(tls_stream), handler, kind, remote_addr).await,
                        Err(e) => warn!("Error establishing TLS connection from {}: {}", remote_addr, e),
                    },
                    None => serve_connection(TokioIo::new(tcp_stream), handler, kind, remote_addr).await,
                }
            });
        }
    }
}

async fn serve_connection<I>(io: I, handler: Arc<dyn Handler>, kind: EndpointKind, remote_addr: SocketAddr)
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler.handle(req).await) }
    });

    if let Err(e) = ServerBuilder::new().keep_alive(true).serve_connection(io, service).await {
        debug!("Error serving {} connection from {}: {}", kind, remote_addr, e);
    }
}

/// The three service endpoints and the management endpoint sharing one
/// [`SharedState`].
pub struct DummyServer {
    endpoints: Vec<Endpoint>,
    state: Arc<SharedState>,
}

impl DummyServer {
    /// Binds every endpoint the configuration enables, using the HTTP
    /// introspector and random chaos.
    pub async fn from_config(config: &Config) -> Result<Self, ServerError> {
        let handler_config = HandlerConfig {
            credentials: config.credentials(),
            introspector: Arc::new(HttpIntrospector::new(&config.introspection)?),
            chaos: Arc::new(RandomChaos::new()),
        };
        Self::bind(config, handler_config, Arc::new(SharedState::new())).await
    }

    pub async fn bind(
        config: &Config,
        handler_config: HandlerConfig,
        state: Arc<SharedState>,
    ) -> Result<Self, ServerError> {
        let requests: Arc<dyn Handler> = Arc::new(RequestHandler::new(handler_config, state.clone()));
        let management: Arc<dyn Handler> = Arc::new(ManagementHandler::new(state.clone()));

        let mut endpoints = vec![
            Endpoint::bind(EndpointKind::Http, config.socket_addr(config.http_port), None, requests.clone()).await?,
        ];

        if config.tls_enabled {
            debug!("Loading TLS certificate from: {}", config.server_certificate);
            debug!("Loading TLS private key from: {}", config.private_key_path());
            let https = tls::server_config(&config.server_certificate, config.private_key_path())?;
            debug!("Loading client CA from: {}", config.client_ca);
            let mutual = tls::mutual_server_config(
                &config.server_certificate,
                config.private_key_path(),
                &config.client_ca,
            )?;

            endpoints.push(
                Endpoint::bind(
                    EndpointKind::Https,
                    config.socket_addr(config.https_port),
                    Some(TlsAcceptor::from(Arc::new(https))),
                    requests.clone(),
                )
                .await?,
            );
            endpoints.push(
                Endpoint::bind(
                    EndpointKind::MutualHttps,
                    config.socket_addr(config.mutual_https_port),
                    Some(TlsAcceptor::from(Arc::new(mutual))),
                    requests,
                )
                .await?,
            );
        } else {
            info!("TLS disabled: HTTPS endpoints are not started");
        }

        endpoints.push(
            Endpoint::bind(
                EndpointKind::Management,
                config.socket_addr(config.management_port),
                None,
                management,
            )
            .await?,
        );

        Ok(Self { endpoints, state })
    }

    pub fn state(&self) -> Arc<SharedState> {
        self.state.clone()
    }

    pub fn local_addr(&self, kind: EndpointKind) -> Option<SocketAddr> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.kind() == kind)
            .and_then(|endpoint| endpoint.local_addr().ok())
    }

    /// Runs all endpoints concurrently; returns when one of them fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let tasks = self.endpoints.into_iter().map(|endpoint| {
            let kind = endpoint.kind();
            async move {
                endpoint.run().await.inspect_err(|e| error!("{} endpoint stopped: {}", kind, e))
            }
        });

        futures::future::try_join_all(tasks).await?;
        Ok(())
    }
}
