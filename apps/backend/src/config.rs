//! Runtime configuration read from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Root for the default database and image paths; export archives are
    /// staged here.
    pub storage_dir: PathBuf,
    pub database_path: PathBuf,
    pub images_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Re-run image reconciliation this often; startup-only when unset.
    pub reconcile_interval: Option<Duration>,
}

impl Config {
    /// Build the config from the process environment.
    ///
    /// Recognised vars: HOST, PORT, STORAGE_DIR, DATABASE_PATH, IMAGES_DIR,
    /// MAX_UPLOAD_BYTES, RECONCILE_INTERVAL_SECS.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let storage_dir = PathBuf::from(lookup("STORAGE_DIR").unwrap_or_else(|| "./storage".to_string()));
        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| storage_dir.join("db.sqlite"));
        let images_dir = lookup("IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| storage_dir.join("images"));

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => 3000,
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got '{}'", raw))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let reconcile_interval = match lookup("RECONCILE_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("RECONCILE_INTERVAL_SECS must be whole seconds, got '{}'", raw))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            storage_dir,
            database_path,
            images_dir,
            max_upload_bytes,
            reconcile_interval,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
