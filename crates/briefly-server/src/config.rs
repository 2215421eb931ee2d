use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;

use briefly_db::{DbBackend, DbConfig};
use briefly_runner::PipelineConfig;

/// Listener, storage and scheduler settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "BRIEFLY_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(long, env = "BRIEFLY_PORT", default_value = "3720")]
    pub port: u16,

    /// Storage backend: sqlite or postgres
    #[arg(long, env = "BRIEFLY_DB_BACKEND", default_value = "sqlite")]
    pub db_backend: String,

    /// SQLite database file (defaults to the data directory)
    #[arg(long, env = "BRIEFLY_SQLITE_PATH")]
    pub sqlite_path: Option<String>,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Seconds between scans for due newsletters
    #[arg(long, env = "BRIEFLY_POLL_INTERVAL", default_value = "30")]
    pub poll_interval: u64,

    #[command(flatten)]
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn db_config(&self) -> Result<DbConfig> {
        let backend = DbBackend::parse_str(&self.db_backend)
            .ok_or_else(|| anyhow!("unknown database backend '{}'", self.db_backend))?;
        Ok(DbConfig {
            backend,
            sqlite_path: self.sqlite_path.clone(),
            database_url: self.database_url.clone(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }
}
