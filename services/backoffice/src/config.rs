//! Back-office configuration.
//!
//! # Purpose
//! Reads service settings from `BASTION_*` environment variables, then applies
//! an optional YAML override file named by `BASTION_CONFIG`.
//!
//! # Security considerations
//! - `jwt_secret` and `database_url` are secrets; they are never logged and
//!   `Debug` output redacts them.
use anyhow::{Context, Result, bail};
use bastion_rbac::{CacheConfig, DEFAULT_SUPER_ROLE};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "pg" => Ok(Self::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

#[derive(Clone)]
pub struct BackofficeConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub jwt_secret: String,
    pub super_role: String,
    pub cache: CacheConfig,
}

impl fmt::Debug for BackofficeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackofficeConfig")
            .field("bind_addr", &self.bind_addr)
            .field("metrics_bind", &self.metrics_bind)
            .field("storage", &self.storage)
            .field("postgres", &self.postgres)
            .field("jwt_secret", &"<redacted>")
            .field("super_role", &self.super_role)
            .field("cache", &self.cache)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct BackofficeConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    database_url: Option<String>,
    pg_max_connections: Option<u32>,
    jwt_secret: Option<String>,
    super_role: Option<String>,
    cache_capacity: Option<u64>,
    cache_ttl_secs: Option<u64>,
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => Ok(Some(
            value.trim().parse().with_context(|| format!("parse {key}"))?,
        )),
        Err(_) => Ok(None),
    }
}

impl BackofficeConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BASTION_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .with_context(|| "parse BASTION_BIND")?;
        let metrics_bind = std::env::var("BASTION_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse BASTION_METRICS_BIND")?;
        let storage = match std::env::var("BASTION_STORAGE") {
            Ok(value) => StorageBackend::parse(&value)?,
            Err(_) => StorageBackend::Memory,
        };
        let postgres = std::env::var("BASTION_DATABASE_URL")
            .ok()
            .map(|url| -> Result<PostgresConfig> {
                Ok(PostgresConfig {
                    url,
                    max_connections: env_parse("BASTION_PG_MAX_CONNECTIONS")?
                        .unwrap_or(DEFAULT_PG_MAX_CONNECTIONS),
                    connect_timeout_ms: env_parse("BASTION_PG_CONNECT_TIMEOUT_MS")?
                        .unwrap_or(DEFAULT_PG_CONNECT_TIMEOUT_MS),
                    acquire_timeout_ms: env_parse("BASTION_PG_ACQUIRE_TIMEOUT_MS")?
                        .unwrap_or(DEFAULT_PG_ACQUIRE_TIMEOUT_MS),
                })
            })
            .transpose()?;
        let jwt_secret = std::env::var("BASTION_JWT_SECRET").unwrap_or_default();
        let super_role =
            std::env::var("BASTION_SUPER_ROLE").unwrap_or_else(|_| DEFAULT_SUPER_ROLE.to_string());
        let cache = CacheConfig {
            max_capacity: env_parse("BASTION_CACHE_CAPACITY")?.unwrap_or(DEFAULT_CACHE_CAPACITY),
            time_to_live: env_parse::<u64>("BASTION_CACHE_TTL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            jwt_secret,
            super_role,
            cache,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("BASTION_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read BASTION_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: BackofficeConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse back-office config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = StorageBackend::parse(&value)?;
        }
        if let Some(url) = override_cfg.database_url {
            let pg = self.postgres.get_or_insert_with(|| PostgresConfig {
                url: String::new(),
                max_connections: DEFAULT_PG_MAX_CONNECTIONS,
                connect_timeout_ms: DEFAULT_PG_CONNECT_TIMEOUT_MS,
                acquire_timeout_ms: DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
            });
            pg.url = url;
        }
        if let (Some(value), Some(pg)) = (override_cfg.pg_max_connections, self.postgres.as_mut())
        {
            pg.max_connections = value;
        }
        if let Some(value) = override_cfg.jwt_secret {
            self.jwt_secret = value;
        }
        if let Some(value) = override_cfg.super_role {
            self.super_role = value;
        }
        if let Some(value) = override_cfg.cache_capacity {
            self.cache.max_capacity = value;
        }
        if let Some(value) = override_cfg.cache_ttl_secs {
            self.cache.time_to_live = (value > 0).then(|| Duration::from_secs(value));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            bail!("BASTION_JWT_SECRET must be set");
        }
        if self.super_role.trim().is_empty() {
            bail!("super role alias must not be empty");
        }
        if self.cache.max_capacity == 0 {
            bail!("decision cache capacity must be positive");
        }
        Ok(())
    }
}
