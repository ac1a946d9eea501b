use anyhow::{Context, bail};
use clap::Parser;
use dummy_server::config::{Config, LogFormat, LogLevel, LoggingConfig};
use dummy_server::{DummyServer, config_validation, logging};
use log::{info, warn};
use std::net::IpAddr;
use std::path::Path;
use tokio::signal;

#[derive(Parser)]
#[clap(
    version = "1.0.0",
    about = "Mock HTTP/HTTPS server with auth checks, failure injection and request recording"
)]
struct Args {
    #[clap(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<String>,

    #[clap(long, value_name = "FILE", help = "Generate a sample configuration file")]
    generate_config: Option<String>,

    #[clap(long, value_name = "ADDR", help = "Address all endpoints bind to (default: 0.0.0.0)")]
    bind: Option<IpAddr>,

    #[clap(long, env = "HTTP_PORT", value_name = "PORT", help = "Port of the plain HTTP endpoint")]
    http_port: Option<u16>,

    #[clap(long, env = "HTTPS_PORT", value_name = "PORT", help = "Port of the HTTPS endpoint")]
    https_port: Option<u16>,

    #[clap(long, env = "HTTPSM_PORT", value_name = "PORT", help = "Port of the mutual TLS HTTPS endpoint")]
    mutual_https_port: Option<u16>,

    #[clap(long, env = "MGMT_PORT", value_name = "PORT", help = "Port of the management endpoint")]
    management_port: Option<u16>,

    #[clap(long, env = "CREDENTIALS", value_name = "USER:PASSWORD", help = "Basic credentials required by the service endpoints")]
    credentials: Option<String>,

    #[clap(long, env = "SERVER_CRT_PATH", value_name = "FILE", help = "Server certificate (PEM, may also hold the key)")]
    server_certificate: Option<String>,

    #[clap(long, env = "SERVER_KEY_PATH", value_name = "FILE", help = "Server private key (defaults to the certificate file)")]
    server_private_key: Option<String>,

    #[clap(long, env = "CLIENT_CA_PATH", value_name = "FILE", help = "CA that client certificates must chain to")]
    client_ca: Option<String>,

    #[clap(long, env = "INTROSPECT_URL", value_name = "URL", help = "Token introspection endpoint for Bearer auth")]
    introspect_url: Option<String>,

    #[clap(long, help = "Only start the HTTP and management endpoints")]
    no_tls: bool,

    #[clap(long, value_name = "LEVEL", value_parser = logging::parse_log_level, help = "Log level: trace, debug, info, warn, error")]
    log_level: Option<LogLevel>,

    #[clap(long, value_name = "FORMAT", value_parser = logging::parse_log_format, help = "Log format: text or json")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(config_file) = &args.generate_config {
        Config::default()
            .to_file(config_file)
            .with_context(|| format!("Failed to write {}", config_file))?;
        println!("Sample configuration file generated: {}", config_file);
        return Ok(());
    }

    let config = load_config(&args)?;
    logging::init(&config.logging.clone().unwrap_or_default())?;

    let report = config_validation::validate(&config);
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    if !report.is_valid {
        bail!("Invalid configuration:\n  {}", report.errors.join("\n  "));
    }

    let server = DummyServer::from_config(&config)
        .await
        .context("Failed to start endpoints")?;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        result = server.run() => {
            result.context("Server error")?;
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(config_file) => {
            if !Path::new(config_file).exists() {
                bail!("Configuration file not found: {}", config_file);
            }
            Config::from_file(config_file)?
        }
        None => Config::default(),
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(port) = args.https_port {
        config.https_port = port;
    }
    if let Some(port) = args.mutual_https_port {
        config.mutual_https_port = port;
    }
    if let Some(port) = args.management_port {
        config.management_port = port;
    }
    if let Some(credentials) = &args.credentials {
        config.credentials = credentials.clone();
    }
    if let Some(path) = &args.server_certificate {
        config.server_certificate = path.clone();
    }
    if let Some(path) = &args.server_private_key {
        config.server_private_key = Some(path.clone());
    }
    if let Some(path) = &args.client_ca {
        config.client_ca = path.clone();
    }
    if let Some(url) = &args.introspect_url {
        config.introspection.url = Some(url.clone());
    }
    if args.no_tls {
        config.tls_enabled = false;
    }

    if args.log_level.is_some() || args.log_format.is_some() {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        if let Some(level) = &args.log_level {
            logging.level = Some(level.clone());
        }
        if let Some(format) = &args.log_format {
            logging.format = Some(format.clone());
        }
    }

    Ok(config)
}
