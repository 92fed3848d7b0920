use anyhow::ensure;
use clap::{Parser, ValueEnum};
use keyhole_core::{UrlOptions, DEFAULT_KEY_LENGTH, DEFAULT_MAX_URL_LENGTH, MAX_KEY_LENGTH};
use keyhole_gateway::telemetry::LogFormat;
use keyhole_shortener::ShortenerConfig;
use keyhole_storage::mysql;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "KEYHOLE_GATEWAY_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "KEYHOLE_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "KEYHOLE_MYSQL_DSN";
pub const SQLITE_URL_ENV: &str = "KEYHOLE_SQLITE_URL";
pub const PUBLIC_HOST_ENV: &str = "KEYHOLE_PUBLIC_HOST";
pub const PUBLIC_PROTOCOL_ENV: &str = "KEYHOLE_PUBLIC_PROTOCOL";
pub const PUBLIC_PORT_ENV: &str = "KEYHOLE_PUBLIC_PORT";
pub const KEY_LENGTH_ENV: &str = "KEYHOLE_KEY_LENGTH";
pub const MAX_URL_LENGTH_ENV: &str = "KEYHOLE_MAX_URL_LENGTH";
pub const LOG_FORMAT_ENV: &str = "KEYHOLE_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SQLITE_URL: &str = "sqlite://keyhole.db?mode=rwc";
pub const DEFAULT_PUBLIC_HOST: &str = "localhost";
pub const DEFAULT_PUBLIC_PROTOCOL: &str = "http";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "sqlite")]
    Sqlite,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "keyhole-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = SQLITE_URL_ENV, default_value = DEFAULT_SQLITE_URL)]
    pub sqlite_url: String,

    /// Host that shortened URLs point at.
    #[arg(long, env = PUBLIC_HOST_ENV, default_value = DEFAULT_PUBLIC_HOST)]
    pub public_host: String,

    #[arg(long, env = PUBLIC_PROTOCOL_ENV, default_value = DEFAULT_PUBLIC_PROTOCOL)]
    pub public_protocol: String,

    #[arg(long, env = PUBLIC_PORT_ENV)]
    pub public_port: Option<u16>,

    #[arg(long, env = KEY_LENGTH_ENV, default_value_t = DEFAULT_KEY_LENGTH)]
    pub key_length: usize,

    #[arg(long, env = MAX_URL_LENGTH_ENV, default_value_t = DEFAULT_MAX_URL_LENGTH)]
    pub max_url_length: usize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CLI {
    /// Rejects settings under which every `shorten` call would fail.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=MAX_KEY_LENGTH).contains(&self.key_length),
            "key length must be between 1 and {MAX_KEY_LENGTH}, got {}",
            self.key_length
        );
        if self.storage == StorageBackendArg::Mysql {
            ensure!(
                self.key_length <= mysql::MAX_KEY_LENGTH,
                "mysql storage holds keys of at most {} characters, got {}",
                mysql::MAX_KEY_LENGTH,
                self.key_length
            );
        }
        Ok(())
    }

    pub fn shortener_config(&self) -> ShortenerConfig {
        ShortenerConfig::builder()
            .key_length(self.key_length)
            .max_url_length(self.max_url_length)
            .url_options(UrlOptions {
                protocol: Some(self.public_protocol.clone()),
                host: Some(self.public_host.clone()),
                port: self.public_port,
                ..UrlOptions::default()
            })
            .build()
    }
}
