//! `dockgate sync` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use dockgate_nginx::{SyncReport, load_rules_from_dir};

use crate::cli::SyncArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `sync` command.
pub async fn execute(
    args: SyncArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (config, controller) = super::load_controller(config_path).await?;

    let rules_dir = args
        .rules_dir
        .unwrap_or_else(|| PathBuf::from(&config.nginx.rules_dir));
    let rules = load_rules_from_dir(&rules_dir)?;
    info!(rules_dir = %rules_dir.display(), count = rules.len(), "syncing rules");

    let report = controller.sync(&rules).await?;

    writer.render(&SyncSummary {
        rules_dir: rules_dir.display().to_string(),
        total: rules.len(),
        report,
    })?;

    Ok(())
}

#[derive(Serialize)]
pub struct SyncSummary {
    pub rules_dir: String,
    /// 디렉토리에서 읽은 규칙 수
    pub total: usize,
    #[serde(flatten)]
    pub report: SyncReport,
}

impl Render for SyncSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Sync: {} ({} rules)",
            self.rules_dir.bold(),
            self.total
        )?;
        for id in &self.report.written {
            writeln!(w, "  {} {}", "written  ".green(), id)?;
        }
        for id in &self.report.removed {
            writeln!(w, "  {} {}", "removed  ".red(), id)?;
        }
        if !self.report.unchanged.is_empty() {
            writeln!(w, "  {} {}", "unchanged".normal(), self.report.unchanged.len())?;
        }
        if self.report.reloaded {
            writeln!(w, "  nginx reloaded")?;
        } else {
            writeln!(w, "  {}", "no changes, nginx not reloaded".dimmed())?;
        }
        Ok(())
    }
}
