//! CLI helper functions

use crate::{
    client::{DocumentStore, FirestoreClient},
    config::{MigrationConfig, parse_table_list},
    migration::{MigrationReport, Migrator},
    source::{MySqlSource, SourceConnection, SourceStore},
    storage::NdjsonStore,
};
use clap::Args;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Command line overrides for a migration run
#[derive(Args, Debug, Default, Clone)]
pub struct MigrateArgs {
    /// Tables to migrate, in order (default: MIGRATE_TABLES or "en")
    pub tables: Vec<String>,

    /// Rows fetched per source query
    #[arg(short, long)]
    pub page_size: Option<usize>,

    /// Documents per atomic commit
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Target collection for every table
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Write documents to this NDJSON file instead of Firestore
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl MigrateArgs {
    /// Apply the overrides on top of environment configuration
    pub fn apply(&self, config: &mut MigrationConfig) {
        if !self.tables.is_empty() {
            config.tables = self
                .tables
                .iter()
                .flat_map(|t| parse_table_list(t))
                .collect();
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(batch_size) = self.batch_size {
            config.load.batch_size = batch_size;
        }
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
    }
}

/// Load and validate configuration for a migration run
pub fn load_config(args: &MigrateArgs) -> Result<MigrationConfig> {
    let mut config = MigrationConfig::from_env()?;
    args.apply(&mut config);
    config.validate().context("Invalid migration configuration")?;
    Ok(config)
}

/// Create the Firestore client from the configured credentials
pub fn load_firestore_client(config: &MigrationConfig) -> Result<FirestoreClient> {
    let credentials = config.target.credentials()?;
    let client =
        FirestoreClient::try_new(credentials).context("Failed to initialize Firestore client")?;
    log::info!("Firestore initialized for {}", client.database().bright_black());
    Ok(client)
}

/// Migrate every configured table
///
/// Pipeline: TableExtractor → DocumentTransformer → BatchLoader
/// Writes to Firestore, or to `output` when given.
pub async fn migrate(config: &MigrationConfig, output: Option<&Path>) -> Result<MigrationReport> {
    let source = MySqlSource::new(config.source.clone());

    match output {
        Some(path) => {
            log::info!("Writing documents to {}", path.display().bright_black());
            let store = NdjsonStore::create(path)?;
            migrate_into(config, &source, &store).await
        }
        None => {
            let client = load_firestore_client(config)?;
            migrate_into(config, &source, &client).await
        }
    }
}

async fn migrate_into<S, D>(config: &MigrationConfig, source: &S, store: &D) -> Result<MigrationReport>
where
    S: SourceStore,
    D: DocumentStore,
{
    log::info!(
        "Migrating {} table(s) into collection {}",
        config.tables.len(),
        config.collection.cyan()
    );

    Migrator::new(source, store, config.collection.as_str())
        .with_page_size(config.page_size)
        .with_load_options(config.load)
        .run(&config.tables)
        .await
}

/// Test connectivity to both the source database and Firestore
pub async fn check_auth(config: &MigrationConfig) -> Result<()> {
    log::info!("Testing source connection...");
    let source = MySqlSource::new(config.source.clone());
    source.open().await?.close().await?;
    log::info!("✓ Source connection OK");

    log::info!("Testing Firestore access...");
    let client = load_firestore_client(config)?;
    client
        .test_connection(&config.collection)
        .await
        .with_context(|| format!("Cannot read collection '{}'", config.collection))?;
    log::info!("✓ Firestore access OK");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_no_overrides() {
        let mut config = MigrationConfig::default();
        MigrateArgs::default().apply(&mut config);
        assert_eq!(config, MigrationConfig::default());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = MigrationConfig::default();
        let args = MigrateArgs {
            tables: vec!["en,hd".to_string(), "am".to_string()],
            page_size: Some(1_000),
            batch_size: Some(100),
            collection: Some("licenses".to_string()),
            output: None,
        };

        args.apply(&mut config);
        assert_eq!(config.tables, vec!["en", "hd", "am"]);
        assert_eq!(config.page_size, 1_000);
        assert_eq!(config.load.batch_size, 100);
        assert_eq!(config.collection, "licenses");
    }

    #[test]
    #[serial_test::serial]
    fn test_load_config_validates() {
        unsafe {
            std::env::set_var("MYSQL_USER", "aamir");
            std::env::set_var("MYSQL_DATABASE", "fcc_amateur");
            std::env::set_var("FIRESTORE_PROJECT_ID", "ham-radio");
        }

        let args = MigrateArgs {
            page_size: Some(10),
            batch_size: Some(20),
            ..MigrateArgs::default()
        };
        let result = load_config(&args);
        assert!(result.is_err());

        let args = MigrateArgs {
            page_size: Some(10),
            batch_size: Some(5),
            ..MigrateArgs::default()
        };
        assert!(load_config(&args).is_ok());

        unsafe {
            std::env::remove_var("MYSQL_USER");
            std::env::remove_var("MYSQL_DATABASE");
            std::env::remove_var("FIRESTORE_PROJECT_ID");
        }
    }
}
