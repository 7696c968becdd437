//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{ArgAction, Parser};

use crate::error::ServerError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// restgate-server - JSON:API gateway
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "restgate-server")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Port to listen on; 0 picks a free one
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Public base URL used in `Location` headers.
    ///
    /// Defaults to `http://<bind>:<port>` of the bound listener.
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Honour `X-Forwarded-Proto` and `X-Forwarded-Ssl`; enable only behind
    /// a proxy that sets them
    #[arg(long, env = "TRUST_FORWARDED_HEADERS", default_value_t = false, action = ArgAction::Set)]
    pub trust_forwarded_headers: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Largest request body accepted, in bytes
    #[arg(long, env = "BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            base_url: None,
            trust_forwarded_headers: false,
            log_json: false,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// The configured base URL, or one derived from the address actually
    /// bound (which differs from `socket_addr` when the port is 0).
    pub fn base_url_for(&self, local: SocketAddr) -> Result<String, ServerError> {
        match &self.base_url {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(url.trim_end_matches('/').to_string())
            }
            Some(url) => Err(ServerError::InvalidBaseUrl(url.clone())),
            None => Ok(format!("http://{local}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let config = Config::try_parse_from([
            "restgate-server",
            "--bind",
            "0.0.0.0",
            "--port",
            "8080",
            "--base-url",
            "https://api.example.com/",
            "--trust-forwarded-headers",
            "true",
            "--log-json",
            "--body-limit",
            "2048",
        ])
        .unwrap();
        assert_eq!(config.socket_addr(), "0.0.0.0:8080".parse().unwrap());
        assert!(config.trust_forwarded_headers);
        assert!(config.log_json);
        assert_eq!(config.body_limit, 2048);
        assert_eq!(
            config.base_url_for(config.socket_addr()).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn forwarded_headers_untrusted_by_default() {
        let parsed = Config::try_parse_from(["restgate-server"]).unwrap();
        assert!(!parsed.trust_forwarded_headers);
    }

    #[test]
    fn base_url_defaults_to_bound_address() {
        let config = Config::default();
        let local: SocketAddr = "127.0.0.1:41234".parse().unwrap();
        assert_eq!(config.base_url_for(local).unwrap(), "http://127.0.0.1:41234");
    }

    #[test]
    fn base_url_needs_http_scheme() {
        let config = Config {
            base_url: Some("ftp://example.com".into()),
            ..Config::default()
        };
        let err = config.base_url_for(config.socket_addr()).unwrap_err();
        assert!(matches!(err, ServerError::InvalidBaseUrl(_)));
    }
}
