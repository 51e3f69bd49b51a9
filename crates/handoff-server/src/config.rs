use anyhow::Result;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Path to RocksDB database
    pub database_path: PathBuf,

    /// Base URL of the authorization server admin API
    pub auth_server_admin_url: String,

    pub auth_server_timeout: Duration,

    /// Upper bound for a provider code exchange including the profile fetch
    pub provider_timeout: Duration,

    /// Seconds the authorization server remembers an accepted login
    pub remember_for: u64,

    /// Refuse to accept a login when the auth log write fails
    pub audit_failure_is_fatal: bool,

    /// JSON file with applications stored at startup
    pub applications_file: Option<PathBuf>,

    /// Scheme used for the request domain unless a trusted proxy sends X-Forwarded-Proto
    pub public_scheme: String,

    /// Proxies whose X-Forwarded-For header is trusted
    pub trusted_proxies: Vec<IpAddr>,

    /// Interval between expired entry sweeps
    pub sweep_interval: Duration,

    pub centrifugo: Option<CentrifugoConfig>,
}

/// Push publisher settings, present when `CENTRIFUGO_ADDR` is set
#[derive(Debug, Clone)]
pub struct CentrifugoConfig {
    pub addr: String,
    pub api_key: String,
    pub launcher_channel: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./data/handoff.db".to_string())
            .into();

        let auth_server_admin_url = std::env::var("AUTH_SERVER_ADMIN_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4445".to_string());

        let auth_server_timeout = Duration::from_secs(
            std::env::var("AUTH_SERVER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        );

        let provider_timeout = Duration::from_secs(
            std::env::var("PROVIDER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        );

        let remember_for = std::env::var("REMEMBER_FOR_SECONDS")
            .unwrap_or_else(|_| "259200".to_string()) // 3 days
            .parse()?;

        let audit_failure_is_fatal = std::env::var("AUDIT_FAILURE_IS_FATAL")
            .unwrap_or_else(|_| "true".to_string())
            .parse()?;

        let applications_file = std::env::var("APPLICATIONS_FILE").ok().map(PathBuf::from);

        let public_scheme = std::env::var("PUBLIC_SCHEME").unwrap_or_else(|_| "https".to_string());
        if public_scheme != "http" && public_scheme != "https" {
            anyhow::bail!("PUBLIC_SCHEME must be http or https");
        }

        let trusted_proxies = std::env::var("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse())
            .collect::<std::result::Result<Vec<IpAddr>, _>>()?;

        let sweep_interval = Duration::from_secs(
            std::env::var("SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
        );

        let centrifugo = match std::env::var("CENTRIFUGO_ADDR") {
            Ok(addr) if !addr.is_empty() => Some(CentrifugoConfig {
                addr,
                api_key: std::env::var("CENTRIFUGO_API_KEY").unwrap_or_default(),
                launcher_channel: std::env::var("CENTRIFUGO_LAUNCHER_CHANNEL")
                    .unwrap_or_else(|_| "launcher".to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            bind_address,
            database_path,
            auth_server_admin_url,
            auth_server_timeout,
            provider_timeout,
            remember_for,
            audit_failure_is_fatal,
            applications_file,
            public_scheme,
            trusted_proxies,
            sweep_interval,
            centrifugo,
        })
    }
}
