use crate::config::TradeboardConfig;
use crate::database::Database;
use anyhow::Result;
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database: Database,
}

/// Creates the on-disk layout, opens the database, and applies the schema.
/// Must complete before the HTTP listener binds so no request ever races the
/// DDL.
pub fn initialize(config: &TradeboardConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)?;
    database.ensure_migrations()?;

    tracing::info!(
        directories_created = ?directories_created,
        db_path = %config.paths.db_path.display(),
        "tradeboard bootstrap complete"
    );

    Ok(BootstrapResources {
        directories_created,
        database,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}
