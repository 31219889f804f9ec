//! Command handlers -- one module per subcommand

pub mod apply;
pub mod config;
pub mod init;
pub mod remove;
pub mod render;
pub mod status;
pub mod sync;

use std::path::Path;

use dockgate_core::config::DockgateConfig;
use dockgate_nginx::{CommandNginx, NginxManagerConfig, ReloadController};

use crate::error::CliError;

/// Load `dockgate.toml` and build a controller backed by the real nginx binary.
pub(crate) async fn load_controller(
    config_path: &Path,
) -> Result<(DockgateConfig, ReloadController<CommandNginx>), CliError> {
    let config = DockgateConfig::load(config_path).await?;
    let manager = NginxManagerConfig::from_core(&config.nginx);
    let controller = ReloadController::from_config(manager)?;
    Ok((config, controller))
}
