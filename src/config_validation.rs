//! Startup checks for the endpoint configuration.
//!
//! Errors stop the server from starting; warnings are logged and point at
//! settings that are legal but probably not what the operator wants.

use crate::config::Config;
use std::collections::HashMap;
use std::fs::File;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::success();

    validate_ports(config, &mut result);
    validate_tls_files(config, &mut result);
    validate_auth(config, &mut result);

    result
}

fn validate_ports(config: &Config, result: &mut ValidationResult) {
    let mut ports = vec![("http", config.http_port), ("management", config.management_port)];
    if config.tls_enabled {
        ports.push(("https", config.https_port));
        ports.push(("mutual https", config.mutual_https_port));
    }

    let mut seen: HashMap<u16, &str> = HashMap::new();
    for (name, port) in ports {
        if port == 0 {
            result.add_error(format!("{} port must be greater than 0", name));
            continue;
        }
        if let Some(other) = seen.insert(port, name) {
            result.add_error(format!("{} and {} endpoints both use port {}", other, name, port));
        }
    }
}

fn validate_tls_files(config: &Config, result: &mut ValidationResult) {
    if !config.tls_enabled {
        return;
    }

    let files = [
        ("Server certificate", config.server_certificate.as_str()),
        ("Server private key", config.private_key_path()),
        ("Client CA", config.client_ca.as_str()),
    ];
    for (label, path) in files {
        if let Err(e) = File::open(path) {
            result.add_error(format!("{} file {} not accessible: {}", label, path, e));
        }
    }
}

fn validate_auth(config: &Config, result: &mut ValidationResult) {
    match &config.introspection.url {
        Some(url) if !url.is_empty() => {
            if let Err(e) = url::Url::parse(url) {
                result.add_error(format!("Invalid introspection URL {}: {}", url, e));
            }
        }
        _ => {
            if !config.credentials.is_empty() {
                result.add_warning(
                    "No introspection URL configured: Bearer tokens will always be rejected".to_string(),
                );
            }
        }
    }

    if config.credentials.is_empty() {
        result.add_warning("No credentials configured: authentication is disabled".to_string());
    } else if !config.credentials.contains(':') {
        result.add_warning("Credentials should have the form user:password".to_string());
    }
}
