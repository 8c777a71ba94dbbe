use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;
use url::Url;

use crate::database::{Credentials, DatabaseConfig};
use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::loader::LoadSettings;
use crate::store::TableSchema;
use crate::validation::ValidationError;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Front service forwarding every request to one of `BACKENDS`.
    #[default]
    Dispatcher,
    /// Owns a count table and serves `/view` and `/count` from it.
    Backend,
    /// Runs the bulk loader once and exits.
    Seed,
    /// Dispatcher and backend in one process.
    Standalone,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    #[default]
    Surreal,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default)]
    pub backends: Vec<Url>,
    #[serde(default = "default_metrics_interval", deserialize_with = "duration")]
    pub metrics_interval: Duration,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub storage: Storage,
    #[serde(default = "default_surreal_url")]
    pub surreal_url: String,
    #[serde(default = "default_surreal_name")]
    pub surreal_ns: String,
    #[serde(default = "default_surreal_name")]
    pub surreal_db: String,
    pub surreal_user: Option<String>,
    pub surreal_pass: Option<String>,

    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_column_family")]
    pub column_family: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,

    #[serde(default = "default_item_count")]
    pub item_count: u64,
    #[serde(default = "default_max_views_count")]
    pub max_views_count: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub seed: Option<u64>,
    #[serde(default)]
    pub overwrite_existing: bool,
    #[serde(default = "default_seed_on_start")]
    pub seed_on_start: bool,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub fn schema(&self) -> Result<TableSchema, ValidationError> {
        TableSchema::new(
            &self.table_name,
            &self.column_family,
            self.replication_factor,
        )
    }

    /// Loader settings; without `SEED` a random one is drawn and logged so the run can be repeated.
    pub fn load_settings(&self) -> Result<LoadSettings, ValidationError> {
        let seed = self.seed.unwrap_or_else(|| {
            let seed = rand::random();
            tracing::info!(seed, "no SEED configured, drew one");
            seed
        });

        Ok(
            LoadSettings::new(self.item_count, self.max_views_count, self.batch_size)?
                .with_seed(seed)
                .with_overwrite_existing(self.overwrite_existing),
        )
    }

    pub fn database(&self) -> DatabaseConfig {
        let credentials = match (&self.surreal_user, &self.surreal_pass) {
            (Some(username), Some(password)) => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        };

        DatabaseConfig::new(
            self.surreal_url.clone(),
            self.surreal_ns.clone(),
            self.surreal_db.clone(),
            credentials,
        )
    }
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_metrics_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_surreal_url() -> String {
    "mem://".to_owned()
}

fn default_surreal_name() -> String {
    "viewcount".to_owned()
}

fn default_table_name() -> String {
    "views_total_count".to_owned()
}

fn default_column_family() -> String {
    "item".to_owned()
}

fn default_replication_factor() -> u32 {
    1
}

fn default_item_count() -> u64 {
    1_000_000
}

fn default_max_views_count() -> u64 {
    10_000_000
}

fn default_batch_size() -> usize {
    1000
}

fn default_seed_on_start() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.role, Role::Dispatcher);
        assert_eq!(config.host, "0.0.0.0:8080".parse().unwrap());
        assert!(config.backends.is_empty());
        assert_eq!(config.metrics_interval, Duration::from_secs(1));
        assert_eq!(config.storage, Storage::Surreal);
        assert_eq!(config.surreal_url, "mem://");

        let schema = config.schema().unwrap();
        assert_eq!(schema.name(), "views_total_count");
        assert_eq!(schema.family(), "item");
        assert_eq!(schema.replication_factor(), 1);

        let settings = config.load_settings().unwrap();
        assert_eq!(settings.item_count(), 1_000_000);
        assert_eq!(settings.max_views_count(), 10_000_000);
        assert_eq!(settings.batch_size(), 1000);
        assert!(!settings.overwrite_existing());
        assert!(config.seed_on_start);
        assert_eq!(config.database().credentials, None);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("ROLE", "backend"),
            ("HOST_ADDRESS", "127.0.0.1:9000"),
            ("BACKENDS", "http://a:8080/,http://b:8080/"),
            ("METRICS_INTERVAL", "250ms"),
            ("STORAGE", "memory"),
            ("SURREAL_USER", "root"),
            ("SURREAL_PASS", "root"),
            ("REPLICATION_FACTOR", "3"),
            ("BATCH_SIZE", "50"),
            ("SEED", "7"),
            ("OVERWRITE_EXISTING", "true"),
        ])
        .unwrap();

        assert_eq!(config.role, Role::Backend);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].host_str(), Some("b"));
        assert_eq!(config.metrics_interval, Duration::from_millis(250));
        assert_eq!(config.storage, Storage::Memory);
        assert_eq!(config.schema().unwrap().replication_factor(), 3);

        let settings = config.load_settings().unwrap();
        assert_eq!(settings.batch_size(), 50);
        assert_eq!(settings.seed(), 7);
        assert!(settings.overwrite_existing());

        let credentials = config.database().credentials.unwrap();
        assert_eq!(credentials.username, "root");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("ROLE", "janitor")]).is_err());
        assert!(config(&[("METRICS_INTERVAL", "soon")]).is_err());

        let zero = config(&[("BATCH_SIZE", "0")]).unwrap();
        assert!(zero.load_settings().is_err());

        let bad_table = config(&[("TABLE_NAME", "views-count")]).unwrap();
        assert!(bad_table.schema().is_err());
    }
}
