#![allow(dead_code)]

use bytes::Bytes;
use dummy_server::auth::Introspector;
use dummy_server::error::IntrospectionError;
use dummy_server::{ChaosPolicy, Config, Credentials, DummyServer, EndpointKind, HandlerConfig, RandomChaos, SharedState};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

pub const USER_PASS: &str = "testuser:testpass";
pub const BASIC_TOKEN: &str = "dGVzdHVzZXI6dGVzdHBhc3M=";

pub type TestError = Box<dyn std::error::Error + Send + Sync>;

/// Rejects every bearer token.
pub struct NoIntrospection;

#[async_trait::async_trait]
impl Introspector for NoIntrospection {
    async fn introspect(&self, _token: &str) -> Result<(), IntrospectionError> {
        Err(IntrospectionError::NotConfigured)
    }
}

pub fn handler_config(credentials: &str) -> HandlerConfig {
    handler_config_with_chaos(credentials, Arc::new(RandomChaos::new()))
}

pub fn handler_config_with_chaos(credentials: &str, chaos: Arc<dyn ChaosPolicy>) -> HandlerConfig {
    HandlerConfig {
        credentials: Credentials::from_plain(credentials),
        introspector: Arc::new(NoIntrospection),
        chaos,
    }
}

/// Every endpoint on an ephemeral loopback port, TLS off.
pub fn ephemeral_config() -> Config {
    Config {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        http_port: 0,
        https_port: 0,
        mutual_https_port: 0,
        management_port: 0,
        tls_enabled: false,
        ..Config::default()
    }
}

pub struct TestServer {
    pub state: Arc<SharedState>,
    addrs: Vec<(EndpointKind, SocketAddr)>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: Config, handler_config: HandlerConfig) -> Self {
        let server = DummyServer::bind(&config, handler_config, Arc::new(SharedState::new()))
            .await
            .unwrap();
        let addrs = [
            EndpointKind::Http,
            EndpointKind::Https,
            EndpointKind::MutualHttps,
            EndpointKind::Management,
        ]
        .into_iter()
        .filter_map(|kind| server.local_addr(kind).map(|addr| (kind, addr)))
        .collect();
        let state = server.state();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self { state, addrs, handle }
    }

    pub fn addr(&self, kind: EndpointKind) -> SocketAddr {
        self.addrs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, addr)| *addr)
            .unwrap()
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr(EndpointKind::Http), path)
    }

    pub fn management_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr(EndpointKind::Management), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn into_test_response(response: Response<Incoming>) -> Result<TestResponse, TestError> {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec())?,
    })
}

pub fn request(method: Method, url: &str, authorization: Option<&str>, body: &str) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(url);
    if let Some(value) = authorization {
        builder = builder.header(hyper::header::AUTHORIZATION, value);
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

pub async fn send(req: Request<Full<Bytes>>) -> TestResponse {
    let client: Client<HttpConnector, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();
    let response = client.request(req).await.unwrap();
    into_test_response(response).await.unwrap()
}

pub async fn get(url: &str) -> TestResponse {
    send(request(Method::GET, url, None, "")).await
}

/// CA, server and client certificates written to a temporary directory.
pub struct TlsFixture {
    pub dir: tempfile::TempDir,
    pub server_bundle: PathBuf,
    pub ca_path: PathBuf,
    ca_der: rustls::pki_types::CertificateDer<'static>,
    client_cert_der: rustls::pki_types::CertificateDer<'static>,
    client_key_der: Vec<u8>,
}

impl TlsFixture {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.distinguished_name.push(DnType::CommonName, "dummy test CA");
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let server_key = KeyPair::generate().unwrap();
        let mut server_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        server_params.distinguished_name.push(DnType::CommonName, "localhost");
        server_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let server_cert = server_params.signed_by(&server_key, &ca_cert, &ca_key).unwrap();

        let client_key = KeyPair::generate().unwrap();
        let mut client_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        client_params.distinguished_name.push(DnType::CommonName, "dummy client");
        client_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let client_cert = client_params.signed_by(&client_key, &ca_cert, &ca_key).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let server_bundle = dir.path().join("server-bundle.crt");
        let ca_path = dir.path().join("rootCA.crt");
        std::fs::write(&server_bundle, format!("{}{}", server_key.serialize_pem(), server_cert.pem())).unwrap();
        std::fs::write(&ca_path, ca_cert.pem()).unwrap();

        Self {
            dir,
            server_bundle,
            ca_path,
            ca_der: ca_cert.der().clone(),
            client_cert_der: client_cert.der().clone(),
            client_key_der: client_key.serialize_der(),
        }
    }

    /// Ephemeral configuration with both TLS endpoints enabled.
    pub fn config(&self) -> Config {
        Config {
            tls_enabled: true,
            server_certificate: self.server_bundle.to_str().unwrap().to_string(),
            client_ca: self.ca_path.to_str().unwrap().to_string(),
            ..ephemeral_config()
        }
    }

    fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca_der.clone()).unwrap();
        roots
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::new(
            ClientConfig::builder()
                .with_root_certificates(self.roots())
                .with_no_client_auth(),
        )
    }

    pub fn client_config_with_cert(&self) -> Arc<ClientConfig> {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.client_key_der.clone()));
        Arc::new(
            ClientConfig::builder()
                .with_root_certificates(self.roots())
                .with_client_auth_cert(vec![self.client_cert_der.clone()], key)
                .unwrap(),
        )
    }
}

/// One request over a fresh TLS connection to `localhost`.
pub async fn send_tls(
    addr: SocketAddr,
    client_config: Arc<ClientConfig>,
    path: &str,
    authorization: Option<&str>,
) -> Result<TestResponse, TestError> {
    let stream = TcpStream::connect(addr).await?;
    let tls = TlsConnector::from(client_config)
        .connect(ServerName::try_from("localhost")?, stream)
        .await?;

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(tls)).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });

    let mut req = request(Method::GET, path, authorization, "");
    req.headers_mut().insert(HOST, "localhost".parse()?);
    let response = sender.send_request(req).await?;
    into_test_response(response).await
}
