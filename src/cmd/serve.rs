//! Relay server command — `courier serve`.

use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use super::super::Cli;
use courier::config::CourierToml;

pub async fn cmd_serve(
    cli: &Cli,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
    require_signature: bool,
) -> Result<()> {
    let courier_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".courier"));
    let file_config = CourierToml::load_or_default(&courier_dir)?;
    for warning in file_config.validate() {
        warn!("{}", warning);
    }

    // CLI flags win over file and environment values
    let mut config = file_config.to_server_config();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    if dev {
        config.dev_mode = true;
    }
    if require_signature {
        config.require_signature = true;
    }

    courier::relay::server::start_server(config).await
}
