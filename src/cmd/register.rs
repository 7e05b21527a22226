//! Job registration command — `courier register`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::super::Cli;
use courier::config::CourierToml;
use courier::relay::db::{DbHandle, RegistryDb};
use courier::relay::registry::JobRegistry;

pub async fn cmd_register(
    cli: &Cli,
    job_id: &str,
    callback_url: &str,
    metadata: Option<&str>,
    db_path: Option<PathBuf>,
) -> Result<()> {
    let metadata = match metadata {
        Some(raw) => serde_json::from_str(raw).context("Metadata must be valid JSON")?,
        None => serde_json::json!({}),
    };

    let db_path = match db_path {
        Some(path) => path,
        None => {
            let courier_dir = cli
                .config_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".courier"));
            CourierToml::load_or_default(&courier_dir)?.db_path()
        }
    };
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = RegistryDb::new(&db_path).context("Failed to open job registry")?;
    let registry = JobRegistry::new(DbHandle::new(db));
    let record = registry.register(job_id, callback_url, metadata).await?;

    println!("Registered job {}", record.job_id);
    println!("  callback URL:   {}", record.callback_url);
    println!("  created at:     {}", record.created_at);
    if let Some(secret) = record.signing_secret {
        println!("  signing secret: {}", secret);
        println!();
        println!("Embed this secret in the agent launch request; it is never shown again.");
    }

    Ok(())
}
