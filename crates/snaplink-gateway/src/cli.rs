use clap::{Parser, ValueEnum};
use snaplink_redirector::{RedirectorConfig, VisitWorkerConfig, MAX_VISIT_QUEUE_CAPACITY};
use snaplink_shortener::ShortenerConfig;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SNAPLINK_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "SNAPLINK_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "SNAPLINK_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "SNAPLINK_MYSQL_DSN";
pub const MYSQL_MAX_CONNECTIONS_ENV: &str = "SNAPLINK_MYSQL_MAX_CONNECTIONS";
pub const CACHE_BACKEND_ENV: &str = "SNAPLINK_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "SNAPLINK_REDIS_URL";
pub const CACHE_TTL_SECS_ENV: &str = "SNAPLINK_CACHE_TTL_SECS";
pub const CACHE_TIMEOUT_MS_ENV: &str = "SNAPLINK_CACHE_TIMEOUT_MS";
pub const STORE_TIMEOUT_MS_ENV: &str = "SNAPLINK_STORE_TIMEOUT_MS";
pub const MAX_CREATE_ATTEMPTS_ENV: &str = "SNAPLINK_MAX_CREATE_ATTEMPTS";
pub const VISIT_QUEUE_CAPACITY_ENV: &str = "SNAPLINK_VISIT_QUEUE_CAPACITY";
pub const VISIT_CONCURRENCY_ENV: &str = "SNAPLINK_VISIT_CONCURRENCY";
pub const LOG_FORMAT_ENV: &str = "SNAPLINK_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "redis")]
    Redis,
    #[value(name = "none")]
    None,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::Memory => write!(f, "memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
            CacheBackendArg::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "snaplink-gateway", version, about = "snaplink URL shortener")]
pub struct Cli {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Public base that short URLs are built from.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = MYSQL_MAX_CONNECTIONS_ENV, default_value_t = 10)]
    pub mysql_max_connections: u32,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::Memory
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = 43_200)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = CACHE_TIMEOUT_MS_ENV, default_value_t = 200)]
    pub cache_timeout_ms: u64,

    #[arg(long, env = STORE_TIMEOUT_MS_ENV, default_value_t = 3_000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = MAX_CREATE_ATTEMPTS_ENV, default_value_t = 5)]
    pub max_create_attempts: u32,

    #[arg(
        long,
        env = VISIT_QUEUE_CAPACITY_ENV,
        default_value_t = 4_096,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new()
            .range(1..=MAX_VISIT_QUEUE_CAPACITY as u64)
    )]
    pub visit_queue_capacity: usize,

    /// Visit increments applied in parallel; keep at or below the MySQL pool size.
    #[arg(
        long,
        env = VISIT_CONCURRENCY_ENV,
        default_value_t = 8,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=1_024)
    )]
    pub visit_concurrency: usize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn shortener_config(&self) -> ShortenerConfig {
        ShortenerConfig::builder()
            .max_attempts(self.max_create_attempts)
            .store_timeout(self.store_timeout())
            .build()
    }

    pub fn visit_worker_config(&self) -> VisitWorkerConfig {
        VisitWorkerConfig::builder()
            .capacity(self.visit_queue_capacity)
            .concurrency(self.visit_concurrency)
            .timeout(self.store_timeout())
            .build()
    }

    pub fn redirector_config(&self) -> RedirectorConfig {
        RedirectorConfig::builder()
            .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .cache_timeout(Duration::from_millis(self.cache_timeout_ms))
            .store_timeout(self.store_timeout())
            .build()
    }
}
