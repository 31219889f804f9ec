//! `dockgate remove` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::cli::RemoveArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `remove` command.
///
/// Removing an id without configuration is not an error.
pub async fn execute(
    args: RemoveArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (_config, controller) = super::load_controller(config_path).await?;

    info!(rule_id = %args.rule_id, "removing rule");
    let removed = controller.remove(&args.rule_id).await?;

    writer.render(&RemoveReport {
        rule_id: args.rule_id,
        removed,
    })?;

    Ok(())
}

#[derive(Serialize)]
pub struct RemoveReport {
    pub rule_id: String,
    /// `false` when no configuration existed for the id
    pub removed: bool,
}

impl Render for RemoveReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.removed {
            writeln!(w, "{} {}", "REMOVED".green().bold(), self.rule_id.bold())
        } else {
            writeln!(
                w,
                "{} {} (no configuration, nothing to do)",
                "SKIPPED".yellow().bold(),
                self.rule_id.bold()
            )
        }
    }
}
