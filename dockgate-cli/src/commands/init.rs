//! `dockgate init` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `init` command.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let (_config, controller) = super::load_controller(config_path).await?;

    let store = controller.store();
    info!(active_dir = %store.active_dir().display(), "bootstrapping nginx configuration");
    let written = controller.bootstrap().await?;

    let report = InitReport {
        active_dir: store.active_dir().display().to_string(),
        main_config: store.main_config().display().to_string(),
        main_config_written: written,
    };
    writer.render(&report)?;

    Ok(())
}

#[derive(Serialize)]
pub struct InitReport {
    pub active_dir: String,
    pub main_config: String,
    /// `false` when an existing main config was left untouched
    pub main_config_written: bool,
}

impl Render for InitReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Active directory: {}", self.active_dir.bold())?;
        if self.main_config_written {
            writeln!(w, "Main config:      {} ({})", self.main_config, "created".green())?;
        } else {
            writeln!(
                w,
                "Main config:      {} ({})",
                self.main_config,
                "exists, unchanged".yellow()
            )?;
        }
        Ok(())
    }
}
