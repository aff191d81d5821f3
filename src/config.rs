//! Migration configuration
//!
//! Settings come from environment variables (usually sourced from a dotenv
//! file) and can be overridden from the command line.

use crate::client::{Auth, Credentials, MAX_BATCH_WRITES, ServiceAccount, validate_collection_id};
use crate::source::SourceConfig;
use crate::upload::{LoadOptions, RetryPolicy};
use eyre::{Context, Result};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

/// Collection every table is written into unless configured otherwise
pub const DEFAULT_COLLECTION: &str = "fcc_amateur_aamir";

/// Tables migrated when none are given
pub const DEFAULT_TABLES: &[&str] = &["en"];

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_$]+(\.[A-Za-z0-9_$]+)?$").expect("table name pattern is valid")
});

/// Where and how to reach Firestore
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetConfig {
    pub project_id: String,
    pub database: Option<String>,
    pub access_token: Option<String>,
    pub emulator_host: Option<String>,
}

impl TargetConfig {
    /// Build client credentials, preferring the emulator when one is set
    pub fn credentials(&self) -> Result<Credentials> {
        let credentials = match (&self.emulator_host, &self.access_token) {
            (Some(host), _) => Credentials::emulator(host, &self.project_id)?,
            (None, Some(token)) => {
                Credentials::new(&self.project_id, Auth::Bearer(token.clone()))?
            }
            (None, None) => eyre::bail!(
                "FIRESTORE_ACCESS_TOKEN environment variable not set (or set FIRESTORE_EMULATOR_HOST)"
            ),
        };
        Ok(match &self.database {
            Some(database) => credentials.with_database(database),
            None => credentials,
        })
    }
}

/// Complete settings for one migration run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,
    /// Single destination for every table
    pub collection: String,
    pub tables: Vec<String>,
    pub page_size: usize,
    pub load: LoadOptions,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            target: TargetConfig::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            page_size: crate::source::DEFAULT_PAGE_SIZE,
            load: LoadOptions::default(),
        }
    }
}

impl MigrationConfig {
    /// Load configuration from environment variables
    ///
    /// Expected environment variables:
    /// - MYSQL_USER, MYSQL_DATABASE: source login and schema (required)
    /// - MYSQL_HOST, MYSQL_PORT, MYSQL_PASSWORD: (optional, default localhost:3306, empty)
    /// - FIRESTORE_PROJECT_ID or GOOGLE_APPLICATION_CREDENTIALS: target project (required)
    /// - FIRESTORE_ACCESS_TOKEN / FIRESTORE_EMULATOR_HOST: target authentication
    /// - FIRESTORE_DATABASE, FIRESTORE_COLLECTION: (optional)
    /// - MIGRATE_TABLES: comma-separated table list (optional)
    /// - MIGRATE_PAGE_SIZE, MIGRATE_BATCH_SIZE, MIGRATE_MAX_ATTEMPTS,
    ///   MIGRATE_BACKOFF_BASE_MS, MIGRATE_BATCH_DELAY_MS: tuning (optional)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let source = SourceConfig {
            host: env_or("MYSQL_HOST", defaults.source.host)?,
            port: env_or("MYSQL_PORT", defaults.source.port)?,
            user: std::env::var("MYSQL_USER").context("MYSQL_USER environment variable not set")?,
            password: env_or("MYSQL_PASSWORD", String::new())?,
            database: std::env::var("MYSQL_DATABASE")
                .context("MYSQL_DATABASE environment variable not set")?,
        };

        let project_id = match std::env::var("FIRESTORE_PROJECT_ID") {
            Ok(project_id) => project_id,
            Err(_) => {
                let path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS").context(
                    "FIRESTORE_PROJECT_ID or GOOGLE_APPLICATION_CREDENTIALS environment variable not set",
                )?;
                ServiceAccount::read(&path)?.project_id
            }
        };

        let target = TargetConfig {
            project_id,
            database: std::env::var("FIRESTORE_DATABASE").ok(),
            access_token: std::env::var("FIRESTORE_ACCESS_TOKEN").ok(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST").ok(),
        };

        let tables = match std::env::var("MIGRATE_TABLES") {
            Ok(list) => parse_table_list(&list),
            Err(_) => defaults.tables,
        };

        let retry = RetryPolicy {
            max_attempts: env_or("MIGRATE_MAX_ATTEMPTS", defaults.load.retry.max_attempts)?,
            base_delay: Duration::from_millis(env_or(
                "MIGRATE_BACKOFF_BASE_MS",
                defaults.load.retry.base_delay.as_millis() as u64,
            )?),
        };
        let load = LoadOptions {
            batch_size: env_or("MIGRATE_BATCH_SIZE", defaults.load.batch_size)?,
            retry,
            batch_delay: Duration::from_millis(env_or(
                "MIGRATE_BATCH_DELAY_MS",
                defaults.load.batch_delay.as_millis() as u64,
            )?),
        };

        Ok(Self {
            source,
            target,
            collection: env_or("FIRESTORE_COLLECTION", defaults.collection)?,
            tables,
            page_size: env_or("MIGRATE_PAGE_SIZE", defaults.page_size)?,
            load,
        })
    }

    /// Check the settings are usable before anything connects
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            eyre::bail!("Page size must be at least 1");
        }
        if self.load.batch_size == 0 {
            eyre::bail!("Batch size must be at least 1");
        }
        if self.load.batch_size > self.page_size {
            eyre::bail!(
                "Batch size ({}) must not exceed page size ({})",
                self.load.batch_size,
                self.page_size
            );
        }
        if self.load.batch_size > MAX_BATCH_WRITES {
            eyre::bail!(
                "Batch size ({}) exceeds the Firestore commit limit of {}",
                self.load.batch_size,
                MAX_BATCH_WRITES
            );
        }
        if self.load.retry.max_attempts == 0 {
            eyre::bail!("Max attempts must be at least 1");
        }
        if self.tables.is_empty() {
            eyre::bail!("No tables to migrate");
        }
        for table in &self.tables {
            if !TABLE_NAME.is_match(table) {
                eyre::bail!("Invalid table name: '{}'", table);
            }
        }
        validate_collection_id(&self.collection)
    }
}

/// Split a comma-separated table list, dropping blanks
pub fn parse_table_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read and parse an environment variable, falling back to `default`
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, value)),
        Err(_) => Ok(default),
    }
}
